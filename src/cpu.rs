use tracing::warn;

use crate::error::Result;

/// Number of logical CPUs available for pinning
pub fn available_cpus() -> usize {
    num_cpus::get().max(1)
}

/// Core for the `index`-th worker thread, round robin over available CPUs
pub fn cpu_for(index: usize) -> usize {
    index % available_cpus()
}

#[cfg(target_os = "linux")]
pub fn pin_to_cpu(cpu_id: usize) -> Result<()> {
    use nix::sched::{ sched_setaffinity, CpuSet };
    use nix::unistd::Pid;

    let mut cpu_set = CpuSet::new();
    cpu_set.set(cpu_id)?;
    // Pid 0 is the calling thread
    sched_setaffinity(Pid::from_raw(0), &cpu_set)?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn pin_to_cpu(_cpu_id: usize) -> Result<()> {
    Ok(())
}

/// Pin the calling thread; failures are logged and otherwise ignored.
pub fn try_pin_current_thread(index: usize) {
    let cpu = cpu_for(index);
    if let Err(e) = pin_to_cpu(cpu) {
        warn!(cpu, error = %e, "failed to pin thread");
    }
}
