use std::net::Ipv4Addr;

/// Interface name fragments preferred when picking the address advertised in media URLs.
const PREFERRED_NAMES: &[&str] = &["eth0", "wlan0", "wi-fi", "ethernet", "wireless"];

/// A non-loopback interface and its IPv4 address.
#[derive(Debug, Clone)]
pub struct IfaceV4 {
    pub name: String,
    pub addr: Ipv4Addr,
}

/// Enumerate non-loopback IPv4 interfaces using the `getifaddrs` crate.
/// Returns empty Vec if enumeration fails.
pub fn list_non_loopback_v4() -> Vec<IfaceV4> {
    use getifaddrs::{Address, InterfaceFlags};

    let Ok(ifaces) = getifaddrs::getifaddrs() else {
        return vec![];
    };
    ifaces
        .filter(|i| !i.flags.contains(InterfaceFlags::LOOPBACK))
        .filter_map(|i| {
            let addr = match &i.address {
                Address::V4(net_addr) => net_addr.address,
                _ => return None,
            };
            Some(IfaceV4 {
                name: i.name.clone(),
                addr,
            })
        })
        .collect()
}

/// True when the host has an interface called `name`, whatever its address family.
pub fn interface_exists(name: &str) -> bool {
    match getifaddrs::getifaddrs() {
        Ok(mut ifaces) => ifaces.any(|i| i.name == name),
        Err(e) => {
            tracing::warn!("Cannot enumerate network interfaces: {}", e);
            false
        }
    }
}

/// Pick the IPv4 address the media server advertises to receivers.
///
/// Wired and wireless interfaces with conventional names win; otherwise the
/// first non-loopback IPv4 address is used. `None` when the host has none.
pub fn local_ipv4() -> Option<Ipv4Addr> {
    pick_preferred(&list_non_loopback_v4())
}

pub(crate) fn pick_preferred(ifaces: &[IfaceV4]) -> Option<Ipv4Addr> {
    ifaces
        .iter()
        .find(|iface| {
            let lower = iface.name.to_ascii_lowercase();
            PREFERRED_NAMES.iter().any(|p| lower.contains(p))
        })
        .or_else(|| ifaces.first())
        .map(|iface| iface.addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(name: &str, addr: [u8; 4]) -> IfaceV4 {
        IfaceV4 {
            name: name.to_string(),
            addr: Ipv4Addr::from(addr),
        }
    }

    #[test]
    fn prefers_conventional_names() {
        let ifaces = vec![iface("docker0", [172, 17, 0, 1]), iface("wlan0", [192, 168, 1, 20])];
        assert_eq!(pick_preferred(&ifaces), Some(Ipv4Addr::new(192, 168, 1, 20)));
    }

    #[test]
    fn falls_back_to_first_interface() {
        let ifaces = vec![iface("enp3s0", [10, 0, 0, 5]), iface("virbr0", [192, 168, 122, 1])];
        assert_eq!(pick_preferred(&ifaces), Some(Ipv4Addr::new(10, 0, 0, 5)));
    }

    #[test]
    fn nothing_to_pick() {
        assert_eq!(pick_preferred(&[]), None);
    }

    #[test]
    fn bogus_interface_does_not_exist() {
        assert!(!interface_exists("pusher-no-such-iface0"));
    }
}
