#[cfg(target_os = "linux")]
use anyhow::{Context, Result};
#[cfg(target_os = "linux")]
use tracing::{debug, info, level_filters::LevelFilter};
#[cfg(target_os = "linux")]
use tracing_subscriber::EnvFilter;

#[cfg(target_os = "linux")]
use dropudp::{
    config::Config,
    lifecycle::Lifecycle,
    loader::kernel::KernelLoader,
};

#[cfg(target_os = "linux")]
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_target(false)
        .init();

    bump_memlock_rlimit();

    let config = Config::default();
    let (mut lifecycle, mut signals) = Lifecycle::start(KernelLoader, &config).with_context(|| {
        format!(
            "failed to attach `{}` from {} to {}",
            config.entry_point,
            config.artifact.display(),
            config.interface
        )
    })?;

    let signal = lifecycle
        .run_until(signals.recv(), &mut std::io::stdout())
        .await;
    info!(%signal, "unloading the eBPF program");

    // A failed detach is logged by the lifecycle and does not change the
    // exit status: there is nothing left to recover at this point.
    lifecycle.shutdown();

    Ok(())
}

/// Lifts the locked-memory limit for kernels without memcg-based accounting
/// of BPF memory, see https://lwn.net/Articles/837122/
#[cfg(target_os = "linux")]
fn bump_memlock_rlimit() {
    let rlim = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };
    // SAFETY: `rlim` is a valid, initialized rlimit.
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret != 0 {
        debug!(
            error = %std::io::Error::last_os_error(),
            "remove limit on locked memory failed"
        );
    }
}

#[cfg(not(target_os = "linux"))]
fn main() {
    eprintln!("dropudp currently supports Linux only.");
}
