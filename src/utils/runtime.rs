use anyhow::Result;

/// Every store mutation happens on this one thread, so the store itself needs no locking.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
