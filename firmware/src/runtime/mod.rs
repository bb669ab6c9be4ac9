use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::bind_interrupts;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::flash::Flash;
use embassy_stm32::gpio::{Level, Output, Pull, Speed};
use embassy_stm32::usart::{self, BufferedUart};
use static_cell::StaticCell;

use node_core::command::{ModuleCatalog, NoopNetwork};
use node_core::supervisor::Supervisor;
use node_core::watchdog::WATCHDOG_TIMEOUT;

use crate::hw::flags::OtaFlagStore;
use crate::hw::rails::GpioRails;
use crate::hw::reset::read_reset_cause;
use crate::hw::watchdog::IwdgWatchdog;
use crate::journal::DefmtJournal;
use crate::modem::UartModem;
use crate::platform::FirmwarePlatform;
use crate::wake::WAKE_LATCH;

mod supervisor_task;
mod wake_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

bind_interrupts!(struct Irqs {
    USART1 => usart::BufferedInterruptHandler<hal::peripherals::USART1>;
});

const UART_BUFFER_SIZE: usize = 256;

static UART_TX_BUFFER: StaticCell<[u8; UART_BUFFER_SIZE]> = StaticCell::new();
static UART_RX_BUFFER: StaticCell<[u8; UART_BUFFER_SIZE]> = StaticCell::new();

pub type FirmwareSupervisor = Supervisor<
    'static,
    UartModem<BufferedUart<'static>>,
    GpioRails<'static>,
    NoopNetwork,
    OtaFlagStore,
    DefmtJournal,
    FirmwarePlatform,
    IwdgWatchdog<'static>,
>;

/// Modules bundled into this build, broadcast on the list-modules command.
fn installed_modules() -> ModuleCatalog {
    let mut catalog = ModuleCatalog::new();
    let _ = catalog.push("node-core", Some(env!("CARGO_PKG_VERSION")));
    let _ = catalog.push("modem-uart", Some(env!("CARGO_PKG_VERSION")));
    let _ = catalog.push("sensor-pack", None);
    catalog
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA8,
        PA10,
        PA15,
        PB5,
        PB6,
        PB7,
        PB8,
        EXTI0,
        IWDG,
        USART1,
        FLASH,
        ..
    } = hal::init(config);

    // Latched flags are read before any rail or peripheral is touched.
    let reset_cause = read_reset_cause();

    let rails = GpioRails::new(
        Output::new(PA8, Level::Low, Speed::Low),
        Output::new(PB5, Level::Low, Speed::Low),
        Output::new(PB8, Level::Low, Speed::Low),
        // Modem enable is active low; start disabled.
        Output::new(PA10, Level::High, Speed::Low),
        Output::new(PA15, Level::Low, Speed::Low),
    );

    let frame_sync = ExtiInput::new(PA0, EXTI0, Pull::Down);

    let mut uart_config = usart::Config::default();
    uart_config.baudrate = 9600;
    let uart = BufferedUart::new(
        USART1,
        Irqs,
        PB7,
        PB6,
        UART_TX_BUFFER.init([0; UART_BUFFER_SIZE]),
        UART_RX_BUFFER.init([0; UART_BUFFER_SIZE]),
        uart_config,
    )
    .expect("uart init");

    let mut supervisor = Supervisor::with_components(
        UartModem::new(uart),
        rails,
        NoopNetwork::new(),
        OtaFlagStore::new(Flash::new_blocking(FLASH)),
        DefmtJournal::new(),
        FirmwarePlatform::new(reset_cause),
        IwdgWatchdog::new(IWDG, WATCHDOG_TIMEOUT),
        &WAKE_LATCH,
    );
    supervisor.set_module_catalog(installed_modules());

    spawner
        .spawn(wake_task::run(frame_sync))
        .expect("failed to spawn wake capture task");
    spawner
        .spawn(supervisor_task::run(supervisor))
        .expect("failed to spawn supervisor task");

    core::future::pending::<()>().await;
}
