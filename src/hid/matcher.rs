//! Deck discovery by descriptor strings

use tracing::{debug, info, warn};

use super::transport::{DescriptorKind, EndpointInfo, Transport};

/// Read a descriptor string, treating any failure as absent
fn descriptor<T: Transport>(
    transport: &T,
    endpoint: &EndpointInfo,
    kind: DescriptorKind,
) -> Option<String> {
    match transport.read_descriptor(endpoint, kind) {
        Ok(value) => value.map(|s| {
            s.trim_matches(|c: char| c.is_whitespace() || c == '\0')
                .to_string()
        }),
        Err(e) => {
            debug!("Failed to read {:?} of {}: {}", kind, endpoint.path, e);
            None
        }
    }
}

/// Check whether an endpoint reports the expected descriptor strings
pub fn endpoint_matches<T: Transport>(
    transport: &T,
    endpoint: &EndpointInfo,
    manufacturer: &str,
    product: &str,
) -> bool {
    descriptor(transport, endpoint, DescriptorKind::Manufacturer).as_deref() == Some(manufacturer)
        && descriptor(transport, endpoint, DescriptorKind::Product).as_deref() == Some(product)
}

/// Find and open the first endpoint whose descriptors match.
///
/// Returns `None` when nothing matches; enumeration or open failures are
/// logged and treated as no match.
pub fn find_device<T: Transport>(
    transport: &T,
    manufacturer: &str,
    product: &str,
) -> Option<(EndpointInfo, T::Handle)> {
    let endpoints = match transport.enumerate() {
        Ok(endpoints) => endpoints,
        Err(e) => {
            warn!("Failed to enumerate HID devices: {}", e);
            return None;
        }
    };

    for endpoint in endpoints {
        if !endpoint_matches(transport, &endpoint, manufacturer, product) {
            continue;
        }
        debug!("Endpoint {} matches {} {}", endpoint.path, manufacturer, product);

        match transport.open(&endpoint) {
            Ok(handle) => {
                info!(
                    "Found {} {} (VID: 0x{:04X}, PID: 0x{:04X})",
                    manufacturer, product, endpoint.vendor_id, endpoint.product_id
                );
                return Some((endpoint, handle));
            }
            Err(e) => warn!("Failed to open {}: {}", endpoint.path, e),
        }
    }

    info!("No {} {} found", manufacturer, product);
    None
}
