//! Control-protocol error codes.
//!
//! Codes are grouped in ranges so the UI can pick a recovery path without
//! knowing every individual code:
//!
//! | Range     | Meaning                               |
//! |-----------|---------------------------------------|
//! | 100-109   | local network failures                |
//! | 110-119   | server availability                   |
//! | 400-404   | client errors, aligned with HTTP      |
//! | 500-501   | server errors, aligned with HTTP      |
//! | 510-519   | VPN service operations                |
//! | 570-579   | tunnel connection failures            |

pub const NETWORK_TIMEOUT: i32 = 100;
pub const NETWORK_UNREACHABLE: i32 = 101;
pub const NETWORK_RESET: i32 = 102;
pub const NETWORK_DNS: i32 = 103;
pub const NETWORK_TLS: i32 = 104;
pub const NETWORK_REFUSED: i32 = 105;

pub const SERVER_UNAVAILABLE: i32 = 110;
pub const SERVER_OVERLOAD: i32 = 111;
pub const SERVER_MAINTENANCE: i32 = 112;

pub const BAD_REQUEST: i32 = 400;
pub const UNAUTHORIZED: i32 = 401;
/// Membership expired; the user must renew rather than log in again.
pub const MEMBERSHIP_EXPIRED: i32 = 402;
pub const FORBIDDEN: i32 = 403;
pub const NOT_FOUND: i32 = 404;

pub const INTERNAL_ERROR: i32 = 500;
pub const NOT_IMPLEMENTED: i32 = 501;

pub const VPN_STOP_FAILED: i32 = 510;
pub const VPN_START_FAILED: i32 = 511;
pub const VPN_RECONNECT_FAILED: i32 = 512;
pub const VPN_TIMEOUT: i32 = 513;

/// Unclassified connection failure. Bare error strings from native hosts
/// are reported with this code.
pub const CONNECTION_FATAL: i32 = 570;
pub const ALL_ADDRS_FAILED: i32 = 571;

pub fn is_network_error(code: i32) -> bool {
    (100..110).contains(&code)
}

pub fn is_server_error(code: i32) -> bool {
    (110..120).contains(&code)
}

pub fn is_vpn_error(code: i32) -> bool {
    (510..520).contains(&code) || (570..580).contains(&code)
}

/// Errors the user resolves by logging in again or renewing.
pub fn is_auth_error(code: i32) -> bool {
    code == UNAUTHORIZED || code == MEMBERSHIP_EXPIRED
}

/// Translation key for a code; `errors.unknown` for anything unlisted.
pub fn i18n_key(code: i32) -> &'static str {
    match code {
        NETWORK_TIMEOUT => "errors.network.timeout",
        NETWORK_UNREACHABLE => "errors.network.unreachable",
        NETWORK_RESET => "errors.network.reset",
        NETWORK_DNS => "errors.network.dns",
        NETWORK_TLS => "errors.network.tls",
        NETWORK_REFUSED => "errors.network.refused",
        SERVER_UNAVAILABLE => "errors.server.unavailable",
        SERVER_OVERLOAD => "errors.server.overload",
        SERVER_MAINTENANCE => "errors.server.maintenance",
        BAD_REQUEST => "errors.client.badRequest",
        UNAUTHORIZED => "errors.vpn.authFailed",
        MEMBERSHIP_EXPIRED => "errors.vpn.membershipExpired",
        FORBIDDEN => "errors.client.forbidden",
        NOT_FOUND => "errors.client.notFound",
        INTERNAL_ERROR => "errors.server.internal",
        NOT_IMPLEMENTED => "errors.server.notImplemented",
        VPN_STOP_FAILED => "errors.vpn.stopFailed",
        VPN_START_FAILED => "errors.vpn.startFailed",
        VPN_RECONNECT_FAILED => "errors.vpn.reconnectFailed",
        VPN_TIMEOUT => "errors.vpn.timeout",
        CONNECTION_FATAL => "errors.vpn.connectionFatal",
        ALL_ADDRS_FAILED => "errors.vpn.allAddrsFailed",
        _ => "errors.unknown",
    }
}
