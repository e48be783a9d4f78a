use std::fmt;

use serde::{Deserialize, Serialize};

/// Register offset between two consecutive PV strings on the GoodWe ET map
const PV_REGISTER_STRIDE: u16 = 4;
/// Voltage register of PV1
const PV1_VOLTAGE_REGISTER: u16 = 35103;

/// MPPT port of the inverter a charger is attached to.
///
/// Mppt1 and Mppt2 carry two strings each, Mppt3 a single one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MpptPort {
    #[default]
    #[serde(rename = "MPPT_1")]
    Mppt1,
    #[serde(rename = "MPPT_2")]
    Mppt2,
    #[serde(rename = "MPPT_3")]
    Mppt3,
}

/// Physical PV string input of the inverter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PvString {
    Pv1,
    Pv2,
    Pv3,
    Pv4,
    Pv5,
}

/// Register pair holding the voltage (V) and current (A) of one string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StringAddress {
    pub string: PvString,
    pub voltage: u16,
    pub current: u16,
}

/// Strings wired to one MPPT port, in ascending address order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringSet {
    Single(StringAddress),
    Pair(StringAddress, StringAddress),
}

impl MpptPort {
    pub const ALL: [MpptPort; 3] = [MpptPort::Mppt1, MpptPort::Mppt2, MpptPort::Mppt3];

    /// Strings covered by this port. Never empty.
    pub fn resolve(self) -> StringSet {
        match self {
            MpptPort::Mppt1 => StringSet::Pair(PvString::Pv1.address(), PvString::Pv2.address()),
            MpptPort::Mppt2 => StringSet::Pair(PvString::Pv3.address(), PvString::Pv4.address()),
            MpptPort::Mppt3 => StringSet::Single(PvString::Pv5.address()),
        }
    }

    /// Parses the configuration name of a port, e.g. `MPPT_2`
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "MPPT_1" => Some(MpptPort::Mppt1),
            "MPPT_2" => Some(MpptPort::Mppt2),
            "MPPT_3" => Some(MpptPort::Mppt3),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MpptPort::Mppt1 => "MPPT_1",
            MpptPort::Mppt2 => "MPPT_2",
            MpptPort::Mppt3 => "MPPT_3",
        }
    }
}

impl fmt::Display for MpptPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl PvString {
    fn index(self) -> u16 {
        match self {
            PvString::Pv1 => 0,
            PvString::Pv2 => 1,
            PvString::Pv3 => 2,
            PvString::Pv4 => 3,
            PvString::Pv5 => 4,
        }
    }

    pub fn address(self) -> StringAddress {
        let voltage = PV1_VOLTAGE_REGISTER + PV_REGISTER_STRIDE * self.index();
        StringAddress {
            string: self,
            voltage,
            current: voltage + 1,
        }
    }
}

impl StringSet {
    pub fn len(&self) -> usize {
        match self {
            StringSet::Single(_) => 1,
            StringSet::Pair(_, _) => 2,
        }
    }

    // A port always covers at least one string
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn to_vec(&self) -> Vec<StringAddress> {
        match *self {
            StringSet::Single(a) => vec![a],
            StringSet::Pair(a, b) => vec![a, b],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_port_resolves_to_one_or_two_strings() {
        for port in MpptPort::ALL {
            let set = port.resolve();
            assert!(set.len() == 1 || set.len() == 2, "{port}");
            assert_eq!(set.to_vec().len(), set.len());
            assert_eq!(set, port.resolve());
        }
    }

    #[test]
    fn addresses_are_ordered_and_distinct() {
        let mut seen = Vec::new();
        for port in MpptPort::ALL {
            let addresses = port.resolve().to_vec();
            assert!(addresses.windows(2).all(|w| w[0] < w[1]));
            seen.extend(addresses);
        }
        let count = seen.len();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), count);
    }

    #[test]
    fn goodwe_register_layout() {
        let pv1 = PvString::Pv1.address();
        assert_eq!((pv1.voltage, pv1.current), (35103, 35104));
        let pv2 = PvString::Pv2.address();
        assert_eq!((pv2.voltage, pv2.current), (35107, 35108));
        assert_eq!(
            MpptPort::Mppt3.resolve(),
            StringSet::Single(PvString::Pv5.address())
        );
    }

    #[test]
    fn port_names_round_trip() {
        for port in MpptPort::ALL {
            assert_eq!(MpptPort::from_name(port.name()), Some(port));
        }
        assert_eq!(MpptPort::from_name("MPPT_9"), None);
        assert_eq!(MpptPort::default(), MpptPort::Mppt1);
    }
}
