use anyhow::{Context, Result};
use serialport::{SerialPortInfo, SerialPortType};
use tracing::{info, warn};

/// Whether the port looks like it could be a programming cable (they are all USB-serial adapters)
pub fn likely_programming_cable(port: &SerialPortInfo) -> bool {
    matches!(port.port_type, SerialPortType::UsbPort(_))
        || port.port_name.contains("USB")
        || port.port_name.contains("COM")
}

pub fn describe_port(port: &SerialPortInfo) -> String {
    match &port.port_type {
        SerialPortType::UsbPort(usb) => format!(
            "{} (USB {:04x}:{:04x}{})",
            port.port_name,
            usb.vid,
            usb.pid,
            usb.product
                .as_deref()
                .map(|p| format!(", {}", p))
                .unwrap_or_default()
        ),
        SerialPortType::PciPort => format!("{} (PCI)", port.port_name),
        SerialPortType::BluetoothPort => format!("{} (Bluetooth)", port.port_name),
        SerialPortType::Unknown => port.port_name.clone(),
    }
}

pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    serialport::available_ports().context("Listing serial ports")
}

fn pick_port(ports: Vec<SerialPortInfo>) -> Option<SerialPortInfo> {
    let mut candidates = ports.into_iter().filter(likely_programming_cable);
    let result = candidates.next()?;

    let others = candidates.count();
    if others > 0 {
        warn!(
            "{} more candidate serial ports found, using the first one: {}",
            others,
            describe_port(&result)
        );
    }

    Some(result)
}

/// Resolves the port to use: the explicitly configured one, or the first likely programming cable
pub fn find_port(configured: Option<&str>) -> Result<String> {
    if let Some(port) = configured {
        return Ok(port.to_string());
    }

    let port = pick_port(list_ports()?)
        .context("No suitable serial port found, specify one with --port")?;
    info!("Auto-detected port: {}", describe_port(&port));

    Ok(port.port_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    fn port(name: &str, port_type: SerialPortType) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type,
        }
    }

    fn usb() -> SerialPortType {
        SerialPortType::UsbPort(UsbPortInfo {
            vid: 0x067b,
            pid: 0x2303,
            serial_number: None,
            manufacturer: Some("Prolific".to_string()),
            product: Some("USB-Serial Controller".to_string()),
        })
    }

    #[test]
    fn prefers_usb_or_com_ports() {
        let ports = vec![
            port("/dev/ttyS0", SerialPortType::Unknown),
            port("/dev/ttyUSB0", SerialPortType::Unknown),
            port("COM4", SerialPortType::Unknown),
        ];

        assert_eq!(pick_port(ports).unwrap().port_name, "/dev/ttyUSB0");
    }

    #[test]
    fn usb_type_counts_even_with_odd_name() {
        let ports = vec![
            port("/dev/ttyS0", SerialPortType::PciPort),
            port("/dev/cu.PL2303-0000", usb()),
        ];

        assert_eq!(pick_port(ports).unwrap().port_name, "/dev/cu.PL2303-0000");
    }

    #[test]
    fn nothing_suitable() {
        let ports = vec![port("/dev/ttyS0", SerialPortType::PciPort)];
        assert!(pick_port(ports).is_none());
    }

    #[test]
    fn configured_port_skips_detection() {
        assert_eq!(find_port(Some("/dev/ttyACM3")).unwrap(), "/dev/ttyACM3");
    }

    #[test]
    fn describes_usb_ports() {
        assert_eq!(
            describe_port(&port("/dev/ttyUSB0", usb())),
            "/dev/ttyUSB0 (USB 067b:2303, USB-Serial Controller)"
        );
    }
}
