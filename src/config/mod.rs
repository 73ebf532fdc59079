mod cluster;
mod defaults;
mod parser;
mod settings;
mod validation;

pub(crate) use cluster::ClusterDrsConfig;
pub(crate) use settings::AppConfig;
