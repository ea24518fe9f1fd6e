use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShareResult {
    Accept,
    Reject,
}

/// One proof-of-work submission as it appears on the share log.
///
/// The wire layout is fixed at 32 bytes, little-endian except for the IPv4
/// address which stays in network byte order:
///
/// ```text
/// offset  0  timestamp       u32
/// offset  4  user_id         i32
/// offset  8  worker_hash_id  i64
/// offset 16  ip              4 octets, network order
/// offset 20  share           u64
/// offset 28  result          u32, 1 = accept, anything else = reject
/// ```
///
/// `worker_hash_id` zero is reserved for the per-user total and never
/// appears in a valid record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Share {
    pub(crate) timestamp: u32,
    pub(crate) user_id: i32,
    pub(crate) worker_hash_id: i64,
    pub(crate) ip: Ipv4Addr,
    pub(crate) share: u64,
    pub(crate) result: ShareResult,
}

impl Share {
    pub(crate) const SIZE: usize = 32;

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self> {
        ensure!(
            bytes.len() == Self::SIZE,
            "share record is {} bytes, expected {}",
            bytes.len(),
            Self::SIZE
        );

        let field = |range: std::ops::Range<usize>| &bytes[range];

        Ok(Self {
            timestamp: u32::from_le_bytes(field(0..4).try_into()?),
            user_id: i32::from_le_bytes(field(4..8).try_into()?),
            worker_hash_id: i64::from_le_bytes(field(8..16).try_into()?),
            ip: Ipv4Addr::from(<[u8; 4]>::try_from(field(16..20))?),
            share: u64::from_le_bytes(field(20..28).try_into()?),
            result: match u32::from_le_bytes(field(28..32).try_into()?) {
                1 => ShareResult::Accept,
                _ => ShareResult::Reject,
            },
        })
    }

    pub(crate) fn encode(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.timestamp.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.user_id.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.worker_hash_id.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.ip.octets());
        bytes[20..28].copy_from_slice(&self.share.to_le_bytes());
        bytes[28..32].copy_from_slice(
            &match self.result {
                ShareResult::Accept => 1u32,
                ShareResult::Reject => 0u32,
            }
            .to_le_bytes(),
        );
        bytes
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.user_id > 0 && self.worker_hash_id != 0 && self.timestamp != 0 && self.share != 0
    }
}

#[cfg(test)]
pub(crate) fn accept_share(user_id: i32, worker_hash_id: i64, timestamp: u32, value: u64) -> Share {
    Share {
        timestamp,
        user_id,
        worker_hash_id,
        ip: Ipv4Addr::new(10, 0, 0, 1),
        share: value,
        result: ShareResult::Accept,
    }
}

impl Display for Share {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "share(timestamp={}, user_id={}, worker_hash_id={}, ip={}, share={}, result={:?})",
            self.timestamp, self.user_id, self.worker_hash_id, self.ip, self.share, self.result
        )
    }
}
