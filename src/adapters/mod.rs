use crate::core::hardware::DeviceMonitor;

mod simulated;

pub use simulated::{SimulatedMonitor, Simulator};

/// Build the reader monitor for the given deck.
///
/// With `stdin_control` set, operator lines on stdin (`mount <id>`,
/// `eject <id>`) are turned into reader events.
pub fn get_monitor(card_ids: Vec<String>, stdin_control: bool) -> Box<dyn DeviceMonitor> {
    let (monitor, controller) = SimulatedMonitor::with_present(card_ids);

    if stdin_control {
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lines().map_while(Result::ok) {
                if !controller.apply_line(line.trim()) {
                    tracing::warn!(input = %line.trim(), "(Simulator) Use: 'mount <id>' or 'eject <id>'");
                }
            }
        });
    }

    Box::new(monitor)
}
