use super::settings::AppConfig;
use crate::balancer::MetricSelection;

impl AppConfig {
    /// Parse the simple KEY="VALUE" config format.
    pub(crate) fn parse_ini(&mut self, contents: &str) {
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"');

                match key {
                    "PORT" => {
                        if let Ok(v) = value.parse() {
                            self.port = v;
                        }
                    }
                    "DB_PATH" => self.db_path = value.to_string(),
                    "TICK_SECONDS" => {
                        if let Ok(v) = value.parse() {
                            self.tick_seconds = v;
                        }
                    }
                    "MIGRATION_TIMEOUT_SECS" => {
                        if let Ok(v) = value.parse() {
                            self.migration_timeout_secs = v;
                        }
                    }
                    "MIGRATE_COMMAND" => self.migrate_command = value.to_string(),
                    "DEFAULT_ALGORITHM" => self.cluster_defaults.algorithm = value.to_string(),
                    "DEFAULT_THRESHOLD" => {
                        if let Ok(v) = value.parse() {
                            self.cluster_defaults.threshold = v;
                        }
                    }
                    "DEFAULT_METRIC" => {
                        if let Ok(v) = MetricSelection::try_from(value) {
                            self.cluster_defaults.metric = v;
                        }
                    }
                    "DEFAULT_INTERVAL_MINUTES" => {
                        if let Ok(v) = value.parse() {
                            self.cluster_defaults.interval_minutes = v;
                        }
                    }
                    "DEFAULT_ITERATION_FRACTION" => {
                        if let Ok(v) = value.parse() {
                            self.cluster_defaults.iteration_fraction = v;
                        }
                    }
                    _ => {} // Ignore unknown keys
                }
            }
        }
    }
}
