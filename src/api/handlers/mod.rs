mod clusters;
mod drs;
mod sse;
mod status;

pub(super) use clusters::{get_clusters, get_snapshot, put_inventory};
pub(super) use drs::{
    cancel_drs, get_drs_config, get_run, list_runs, preview_drs, run_drs, update_drs_config,
};
pub(super) use sse::sse_events;
pub(super) use status::get_status;
