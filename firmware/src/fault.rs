//! Unrecoverable errors
//!
//! Release builds reset the chip. Debug builds park the core with
//! interrupts off so the state can be inspected with a probe.

use radiosoc_core::HalError;

/// Give up after an error the firmware cannot handle
pub fn reset_or_halt(error: HalError) -> ! {
    #[cfg(feature = "defmt")]
    defmt::error!("💥 fatal: {}", error);
    #[cfg(not(feature = "defmt"))]
    let _ = error;

    halt_or_reset()
}

fn halt_or_reset() -> ! {
    if cfg!(debug_assertions) {
        cortex_m::interrupt::disable();
        loop {
            cortex_m::asm::wfe();
        }
    } else {
        cortex_m::peripheral::SCB::sys_reset()
    }
}

// panic-probe provides the handler when defmt is enabled
#[cfg(not(feature = "defmt"))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    halt_or_reset()
}
