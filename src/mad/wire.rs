//! Management datagram layout.
//!
//! Only the common MAD header is interpreted. The 232-byte class-specific
//! payload is carried as raw bytes.

use std::{fmt, mem};

use memoffset::offset_of;

use crate::error::{EceError, Result};

/// Size of a MAD in bytes.
pub const IB_MAD_SIZE: usize = 256;

/// Size of the common MAD header in bytes.
pub const IB_MAD_HDR_SIZE: usize = 24;

/// Size of the payload following the common MAD header.
pub const IB_MAD_DATA_SIZE: usize = IB_MAD_SIZE - IB_MAD_HDR_SIZE;

/// MAD base version.
pub const IB_MGMT_BASE_VERSION: u8 = 1;

/// Communication Manager management class.
pub const UMAD_CLASS_CM: u8 = 0x07;

/// Communication Manager class version.
pub const UMAD_CM_CLASS_VERSION: u8 = 1;

/// `Get()` method.
pub const UMAD_METHOD_GET: u8 = 0x01;

/// `Send()` method.
pub const UMAD_METHOD_SEND: u8 = 0x03;

/// `ClassPortInfo` attribute ID.
pub const UMAD_ATTR_CLASS_PORT_INFO: u16 = 0x0001;

/// Well-known Q_Key of QP1.
pub const IB_DEFAULT_QP1_QKEY: u32 = 0x8001_0000;

/// Permissive LID.
pub const IB_LID_PERMISSIVE: u16 = 0xffff;

/// Common MAD header, in host byte order.
///
/// The in-memory layout is the same as the wire layout; only the byte order
/// of multi-byte fields differs (big-endian on the wire).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MadHeader {
    pub base_version: u8,
    pub mgmt_class: u8,
    pub class_version: u8,
    pub method: u8,
    pub status: u16,
    pub class_specific: u16,
    pub tid: u64,
    pub attr_id: u16,
    pub resv: u16,
    pub attr_mod: u32,
}

macro_rules! put_be {
    ($buf:expr, $field:ident, $val:expr) => {{
        let off = offset_of!(MadHeader, $field);
        let bytes = $val.to_be_bytes();
        $buf[off..off + bytes.len()].copy_from_slice(&bytes);
    }};
}

macro_rules! get_be {
    ($buf:expr, $field:ident, $ty:ty) => {{
        let off = offset_of!(MadHeader, $field);
        let mut raw = [0u8; mem::size_of::<$ty>()];
        let len = raw.len();
        raw.copy_from_slice(&$buf[off..off + len]);
        <$ty>::from_be_bytes(raw)
    }};
}

impl MadHeader {
    /// Serialize the header into its wire format.
    pub fn to_bytes(&self) -> [u8; IB_MAD_HDR_SIZE] {
        let mut buf = [0u8; IB_MAD_HDR_SIZE];
        put_be!(buf, base_version, self.base_version);
        put_be!(buf, mgmt_class, self.mgmt_class);
        put_be!(buf, class_version, self.class_version);
        put_be!(buf, method, self.method);
        put_be!(buf, status, self.status);
        put_be!(buf, class_specific, self.class_specific);
        put_be!(buf, tid, self.tid);
        put_be!(buf, attr_id, self.attr_id);
        put_be!(buf, resv, self.resv);
        put_be!(buf, attr_mod, self.attr_mod);
        buf
    }

    /// Parse a header from its wire format.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < IB_MAD_HDR_SIZE {
            return Err(EceError::ShortMad(buf.len()));
        }
        Ok(Self {
            base_version: get_be!(buf, base_version, u8),
            mgmt_class: get_be!(buf, mgmt_class, u8),
            class_version: get_be!(buf, class_version, u8),
            method: get_be!(buf, method, u8),
            status: get_be!(buf, status, u16),
            class_specific: get_be!(buf, class_specific, u16),
            tid: get_be!(buf, tid, u64),
            attr_id: get_be!(buf, attr_id, u16),
            resv: get_be!(buf, resv, u16),
            attr_mod: get_be!(buf, attr_mod, u32),
        })
    }
}

/// A management datagram.
#[derive(Clone, PartialEq, Eq)]
pub struct Mad {
    /// Common header.
    pub hdr: MadHeader,

    /// Class-specific payload.
    pub data: [u8; IB_MAD_DATA_SIZE],
}

impl Mad {
    /// Create a MAD with the given header and an all-zero payload.
    pub fn new(hdr: MadHeader) -> Self {
        Self {
            hdr,
            data: [0; IB_MAD_DATA_SIZE],
        }
    }

    /// Create the CM `ClassPortInfo` MAD used to probe for ECE support.
    pub fn class_port_info(method: u8, tid: u64, attr_mod: u32) -> Self {
        Self::new(MadHeader {
            base_version: IB_MGMT_BASE_VERSION,
            mgmt_class: UMAD_CLASS_CM,
            class_version: UMAD_CM_CLASS_VERSION,
            method,
            tid,
            attr_id: UMAD_ATTR_CLASS_PORT_INFO,
            attr_mod,
            ..Default::default()
        })
    }

    /// Check whether this is a CM `ClassPortInfo` MAD.
    pub fn is_class_port_info(&self) -> bool {
        self.hdr.mgmt_class == UMAD_CLASS_CM && self.hdr.attr_id == UMAD_ATTR_CLASS_PORT_INFO
    }

    /// Serialize the MAD into its wire format.
    pub fn to_bytes(&self) -> [u8; IB_MAD_SIZE] {
        let mut buf = [0u8; IB_MAD_SIZE];
        buf[..IB_MAD_HDR_SIZE].copy_from_slice(&self.hdr.to_bytes());
        buf[IB_MAD_HDR_SIZE..].copy_from_slice(&self.data);
        buf
    }

    /// Parse a MAD from its wire format.
    ///
    /// A payload shorter than [`IB_MAD_DATA_SIZE`] is zero-padded; bytes
    /// beyond [`IB_MAD_SIZE`] are ignored.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        let mut mad = Self::new(MadHeader::from_bytes(buf)?);
        let payload = &buf[IB_MAD_HDR_SIZE..buf.len().min(IB_MAD_SIZE)];
        mad.data[..payload.len()].copy_from_slice(payload);
        Ok(mad)
    }
}

impl Default for Mad {
    fn default() -> Self {
        Self::new(MadHeader::default())
    }
}

impl fmt::Debug for Mad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mad").field("hdr", &self.hdr).finish()
    }
}

/// Address of a MAD peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MadAddr {
    /// Destination (when sending) or source (when received) LID.
    pub lid: u16,

    /// Remote QP number.
    pub qpn: u32,

    /// Remote Q_Key.
    pub qkey: u32,

    /// Service level.
    pub sl: u8,
}

impl Default for MadAddr {
    /// The CM GSI of whoever answers the permissive LID.
    fn default() -> Self {
        Self {
            lid: IB_LID_PERMISSIVE,
            qpn: 1,
            qkey: IB_DEFAULT_QP1_QKEY,
            sl: 0,
        }
    }
}

/// A MAD together with its peer address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Datagram {
    pub addr: MadAddr,
    pub mad: Mad,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repr() {
        assert_eq!(mem::size_of::<MadHeader>(), IB_MAD_HDR_SIZE);
        assert_eq!(offset_of!(MadHeader, tid), 8);
        assert_eq!(offset_of!(MadHeader, attr_id), 16);
        assert_eq!(offset_of!(MadHeader, attr_mod), 20);
    }

    #[test]
    fn test_class_port_info_wire() {
        let mad = Mad::class_port_info(UMAD_METHOD_GET, 0x0102_0304_0506_0708, 0);
        let buf = mad.to_bytes();
        assert_eq!(buf.len(), IB_MAD_SIZE);
        assert_eq!(&buf[..4], &[1, UMAD_CLASS_CM, 1, UMAD_METHOD_GET]);
        assert_eq!(&buf[8..16], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&buf[16..18], &[0, 1]);
        assert_eq!(&buf[20..24], &[0, 0, 0, 0]);
        assert!(buf[IB_MAD_HDR_SIZE..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_parse_reply() {
        let mut buf = Mad::class_port_info(UMAD_METHOD_SEND, 42, 0x2000).to_bytes();
        buf[IB_MAD_HDR_SIZE] = 0xab;
        let mad = Mad::from_bytes(&buf).unwrap();
        assert!(mad.is_class_port_info());
        assert_eq!(mad.hdr.method, UMAD_METHOD_SEND);
        assert_eq!(mad.hdr.tid, 42);
        assert_eq!(mad.hdr.attr_mod, 0x2000);
        assert_eq!(mad.data[0], 0xab);
    }

    #[test]
    fn test_parse_header_fields() {
        let hdr = MadHeader {
            base_version: IB_MGMT_BASE_VERSION,
            mgmt_class: UMAD_CLASS_CM,
            class_version: UMAD_CM_CLASS_VERSION,
            method: UMAD_METHOD_GET,
            status: 0x0102,
            class_specific: 0x0304,
            tid: 0x1122_3344_5566_7788,
            attr_id: UMAD_ATTR_CLASS_PORT_INFO,
            resv: 0x0506,
            attr_mod: 0x0708_090a,
        };
        let buf = hdr.to_bytes();
        assert_eq!(&buf[4..8], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(MadHeader::from_bytes(&buf).unwrap(), hdr);
    }

    #[test]
    fn test_short_buffer() {
        let buf = [0u8; IB_MAD_HDR_SIZE - 1];
        assert!(matches!(
            Mad::from_bytes(&buf),
            Err(EceError::ShortMad(n)) if n == IB_MAD_HDR_SIZE - 1
        ));

        // Header only: payload is zero-padded.
        let hdr = Mad::class_port_info(UMAD_METHOD_GET, 7, 0).hdr.to_bytes();
        let mad = Mad::from_bytes(&hdr).unwrap();
        assert_eq!(mad.hdr.tid, 7);
        assert!(mad.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_default_addr() {
        let addr = MadAddr::default();
        assert_eq!(addr.lid, IB_LID_PERMISSIVE);
        assert_eq!(addr.qpn, 1);
        assert_eq!(addr.qkey, IB_DEFAULT_QP1_QKEY);
    }
}
