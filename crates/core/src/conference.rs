//! Conference fan-out.
//!
//! In [`Fanout`](ConferenceMode::Fanout) mode every outgoing RTP packet is
//! delivered once per configured SSRC, each copy relabelled with that SSRC.
//! This emulates a mixer rebroadcasting one payload for several
//! contributing sources. RTCP is never fanned out; in fan-out mode it is
//! not delivered at all.

use crate::buffer::Buffer;
use crate::error::Result;
use crate::rtp::SSRC_OFFSET;

/// Delivery policy of a loopback interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConferenceMode {
    /// Forward packets unchanged.
    #[default]
    Direct,
    /// Emit one RTP copy per SSRC, in list order.
    Fanout(Vec<u32>),
}

impl ConferenceMode {
    /// `enabled` selects fan-out over `ssrcs`; otherwise back to direct.
    pub fn set(&mut self, enabled: bool, ssrcs: &[u32]) {
        *self = if enabled {
            Self::Fanout(ssrcs.to_vec())
        } else {
            Self::Direct
        };
        tracing::debug!(enabled, sources = ssrcs.len(), "conference mode changed");
    }

    pub fn is_fanout(&self) -> bool {
        matches!(self, Self::Fanout(_))
    }

    /// SSRCs used for fan-out; empty in direct mode.
    pub fn ssrcs(&self) -> &[u32] {
        match self {
            Self::Direct => &[],
            Self::Fanout(ssrcs) => ssrcs,
        }
    }

    /// Copies of an RTP packet to deliver under the current mode.
    ///
    /// Clones differ from `packet` only in the four SSRC bytes. Fails when
    /// fanning out a packet too short to hold an SSRC.
    pub fn fan_out_rtp(&self, packet: &Buffer) -> Result<Vec<Buffer>> {
        match self {
            Self::Direct => Ok(vec![packet.clone()]),
            Self::Fanout(ssrcs) => ssrcs
                .iter()
                .map(|&ssrc| -> Result<Buffer> {
                    let mut copy = packet.clone();
                    copy.write_be32(SSRC_OFFSET, ssrc)?;
                    Ok(copy)
                })
                .collect(),
        }
    }

    /// Copy of an RTCP packet to deliver, if any.
    pub fn deliver_rtcp(&self, packet: &Buffer) -> Option<Buffer> {
        match self {
            Self::Direct => Some(packet.clone()),
            Self::Fanout(_) => None,
        }
    }
}
