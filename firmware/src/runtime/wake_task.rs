use embassy_stm32::exti::ExtiInput;

use node_core::wake::WakeSnapshot;

use crate::platform;
use crate::wake::{WAKE_LATCH, WAKE_SIGNAL};

/// Captures frame-synchronization edges from the modem's flag line.
///
/// Runs at the shortest possible path the executor offers: the EXTI interrupt
/// wakes this task directly and the body is four primitive stores plus a
/// signal pulse, with no allocation and no journaling.
#[embassy_executor::task]
pub async fn run(mut frame_sync: ExtiInput<'static>) -> ! {
    loop {
        frame_sync.wait_for_rising_edge().await;
        WAKE_LATCH.on_edge(WakeSnapshot::new(
            platform::wall_clock_seconds(),
            platform::monotonic_millis(),
            platform::monotonic_micros(),
        ));
        WAKE_SIGNAL.signal(());
    }
}
