// Prints what `--device auto` would pick, and the alternatives.

use aplusb::{device, DevicePreference};

fn main() -> Result<(), aplusb::ClError> {
    let devices = device::enumerate()?;
    for (i, d) in devices.iter().enumerate() {
        println!("[{i}] {} / {} ({})", d.platform, d.name, d.kind);
    }
    match device::pick(&devices, DevicePreference::Auto) {
        Some(i) => println!("auto -> [{i}] {}", devices[i].name),
        None => println!("auto -> no device"),
    }
    Ok(())
}
