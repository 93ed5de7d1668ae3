use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber. `RUST_LOG` is honored, with this
/// crate defaulting to `info`.
///
/// Safe to call more than once: later calls leave the installed subscriber
/// in place.
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("prompt_consistency=info".parse()?);

    // Already initialized (e.g. by another test) is not an error
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_repeatable() {
        init_tracing().expect("Should initialize tracing");
        init_tracing().expect("Should tolerate a second initialization");
    }
}
