use crate::runtime::FirmwareSupervisor;

#[embassy_executor::task]
pub async fn run(mut supervisor: FirmwareSupervisor) -> ! {
    supervisor.run().await
}
