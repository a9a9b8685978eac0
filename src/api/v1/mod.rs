pub mod tidbcluster;
