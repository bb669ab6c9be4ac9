//! GPIO-backed rail switching.

#![cfg(target_os = "none")]

use embassy_stm32::gpio::{Level, Output};

use node_core::power::{RailAction, RailControl, RailId, RailPolarity, rail_by_id};

/// One push-pull output per rail in the catalog.
pub struct GpioRails<'d> {
    logic: Output<'d>,
    tx_driver: Output<'d>,
    bus_pullups: Output<'d>,
    modem: Output<'d>,
    status_led: Output<'d>,
}

impl<'d> GpioRails<'d> {
    pub fn new(
        logic: Output<'d>,
        tx_driver: Output<'d>,
        bus_pullups: Output<'d>,
        modem: Output<'d>,
        status_led: Output<'d>,
    ) -> Self {
        Self {
            logic,
            tx_driver,
            bus_pullups,
            modem,
            status_led,
        }
    }

    fn output_mut(&mut self, rail: RailId) -> &mut Output<'d> {
        match rail {
            RailId::Logic => &mut self.logic,
            RailId::TxDriver => &mut self.tx_driver,
            RailId::BusPullups => &mut self.bus_pullups,
            RailId::Modem => &mut self.modem,
            RailId::StatusLed => &mut self.status_led,
        }
    }

    /// Pin level that enables `rail`, honoring the catalog polarity.
    fn enable_level(rail: RailId) -> Level {
        match rail_by_id(rail).polarity {
            RailPolarity::ActiveHigh => Level::High,
            RailPolarity::ActiveLow => Level::Low,
        }
    }
}

impl RailControl for GpioRails<'_> {
    fn apply(&mut self, rail: RailId, action: RailAction) {
        let enable = Self::enable_level(rail);
        let level = match action {
            RailAction::Enable => enable,
            RailAction::Disable => match enable {
                Level::High => Level::Low,
                Level::Low => Level::High,
            },
        };
        self.output_mut(rail).set_level(level);
    }
}
