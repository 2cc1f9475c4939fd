use serde::{Deserialize, Serialize};

/// Identifier value marking a registry header row.
pub const HEADER_SENTINEL: &str = "id";

/// Which registry columns are carried into merged output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnrichmentVariant {
    /// `id, device_address`
    #[default]
    Address,
    /// `id, device_address, device_eui`
    AddressEui,
}

impl EnrichmentVariant {
    pub fn field_names(self) -> &'static [&'static str] {
        match self {
            Self::Address => &["id", "device_address"],
            Self::AddressEui => &["id", "device_address", "device_eui"],
        }
    }

    pub fn width(self) -> usize {
        self.field_names().len()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Address => "address",
            Self::AddressEui => "address-eui",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub id: String,
    pub device_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_eui: Option<String>,
}

impl RegistryRecord {
    /// Split one registry line. Missing fields come back empty rather than failing;
    /// fields past the variant's width are ignored.
    pub fn parse_line(line: &str, variant: EnrichmentVariant) -> Self {
        let mut fields = line.split(',');
        let id = fields.next().unwrap_or_default().to_string();
        let device_address = fields.next().unwrap_or_default().to_string();
        let device_eui = match variant {
            EnrichmentVariant::Address => None,
            EnrichmentVariant::AddressEui => Some(fields.next().unwrap_or_default().to_string()),
        };
        Self {
            id,
            device_address,
            device_eui,
        }
    }

    pub fn is_header(&self) -> bool {
        self.id == HEADER_SENTINEL
    }

    /// Values prepended to every merged row, in `field_names` order.
    pub fn enrichment_values(&self, variant: EnrichmentVariant) -> Vec<&str> {
        let mut out = vec![self.id.as_str(), self.device_address.as_str()];
        if variant == EnrichmentVariant::AddressEui {
            out.push(self.device_eui.as_deref().unwrap_or_default());
        }
        out
    }

    /// File name of this device's data export.
    pub fn data_file_name(&self) -> String {
        format!("{}.csv", self.device_address)
    }
}
