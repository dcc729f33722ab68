use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Sets up a SIGINT/SIGTERM handler that clears the shared `running` flag.
///
/// # Arguments
///
/// * `running_flag` - shared flag polled by the capture thread and the
///   ingestion loop
///
/// # Errors
///
/// Fails if a handler has already been installed for this process.
pub fn setup_ctrlc_handler(running_flag: Arc<AtomicBool>) -> Result<(), ctrlc::Error> {
    let flag_clone = Arc::clone(&running_flag);

    ctrlc::set_handler(move || {
        flag_clone.store(false, Ordering::SeqCst);
    })
}
