pub mod fingerprint;
pub mod folders;
pub mod local_walk;
pub mod orchestrator;
pub mod paths;
pub mod reconcile;
pub mod remote_scan;
#[cfg(test)]
mod test_support;
