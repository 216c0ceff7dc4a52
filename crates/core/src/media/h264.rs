use base64::prelude::{BASE64_STANDARD, Engine as _};

/// Mask selecting the 5-bit `nal_unit_type` field of a NAL header byte.
pub const NAL_TYPE_MASK: u8 = 0x1F;

/// Mask selecting the forbidden-zero and NRI bits of a NAL header byte.
const NAL_F_NRI_MASK: u8 = 0xE0;

/// Length of the big-endian size prefix in front of each STAP-A unit.
const STAP_A_LENGTH_PREFIX: usize = 2;

/// H.264 NAL unit type (the low 5 bits of the NAL header, RFC 6184 §1.3).
///
/// Values 24..=29 are the RTP payload structures defined by RFC 6184 rather
/// than coded data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NalType(u8);

impl NalType {
    pub const NON_IDR_SLICE: NalType = NalType(1);
    pub const IDR_SLICE: NalType = NalType(5);
    pub const SEI: NalType = NalType(6);
    pub const SPS: NalType = NalType(7);
    pub const PPS: NalType = NalType(8);
    pub const STAP_A: NalType = NalType(24);
    pub const FU_A: NalType = NalType(28);

    /// Extract the type from a NAL header (or FU indicator / FU header) byte.
    pub fn from_header(byte: u8) -> Self {
        NalType(byte & NAL_TYPE_MASK)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Human-readable name. Types without an entry are `"Reserved"`.
    pub fn name(self) -> &'static str {
        match self.0 {
            1 => "Coded slice of a non-IDR picture",
            5 => "Coded slice of an IDR picture",
            6 => "Supplemental enhancement information (SEI)",
            7 => "Sequence parameter set (SPS)",
            8 => "Picture parameter set (PPS)",
            9 => "Access unit delimiter",
            10 => "End of sequence",
            11 => "End of stream",
            12 => "Filler data",
            24 => "STAP-A (Single-time aggregation packet)",
            25 => "STAP-B",
            26 => "MTAP16",
            27 => "MTAP24",
            28 => "FU-A (Fragmentation unit)",
            29 => "FU-B",
            _ => "Reserved",
        }
    }
}

impl std::fmt::Display for NalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.0, self.name())
    }
}

/// A classified NAL unit borrowed from an RTP payload.
///
/// `data` starts with the NAL header byte and is never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalUnit<'a> {
    data: &'a [u8],
}

impl<'a> NalUnit<'a> {
    fn new(data: &'a [u8]) -> Option<Self> {
        if data.is_empty() {
            None
        } else {
            Some(Self { data })
        }
    }

    pub fn nal_type(&self) -> NalType {
        NalType::from_header(self.data[0])
    }

    pub fn name(&self) -> &'static str {
        self.nal_type().name()
    }

    /// Size in bytes, header byte included.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Raw SPS/PPS bytes following the NAL header, if this is a parameter set.
    ///
    /// The syntax elements are not parsed.
    pub fn parameter_set(&self) -> Option<ParameterSet<'a>> {
        match self.nal_type() {
            NalType::SPS => Some(ParameterSet::Sps(&self.data[1..])),
            NalType::PPS => Some(ParameterSet::Pps(&self.data[1..])),
            _ => None,
        }
    }
}

/// Parameter-set bytes surfaced from a single NAL unit, header byte excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterSet<'a> {
    Sps(&'a [u8]),
    Pps(&'a [u8]),
}

impl<'a> ParameterSet<'a> {
    pub fn data(&self) -> &'a [u8] {
        match self {
            Self::Sps(d) | Self::Pps(d) => d,
        }
    }
}

/// One FU-A fragment (RFC 6184 §5.8).
///
/// ```text
/// FU indicator:  [F|NRI|Type=28]
/// FU header:     [S|E|R|NAL_Type]
/// Fragment data: [...]
/// ```
///
/// Fragments are classified one packet at a time. Joining them back into the
/// original NAL unit is left to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    pub indicator: u8,
    pub start: bool,
    pub end: bool,
    /// Type of the fragmented NAL unit, taken from the FU header.
    pub nal_type: NalType,
    /// Whole RTP payload size, FU indicator and header included.
    pub size: usize,
    /// Fragment bytes after the FU indicator and FU header.
    pub data: &'a [u8],
}

impl Fragment<'_> {
    /// Original NAL header byte: F and NRI from the FU indicator, type from
    /// the FU header. Only available on the start fragment.
    pub fn reconstructed_header(&self) -> Option<u8> {
        self.start
            .then(|| (self.indicator & NAL_F_NRI_MASK) | self.nal_type.value())
    }
}

/// Structure of an H.264 RTP payload, keyed by the NAL type of its first byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum H264Payload<'a> {
    /// The payload is one NAL unit.
    Single(NalUnit<'a>),
    /// STAP-A: the units that could be read before the data ran out.
    StapA(Vec<NalUnit<'a>>),
    /// FU-A: one fragment of a larger NAL unit.
    FuA(Fragment<'a>),
}

impl<'a> H264Payload<'a> {
    /// Classify an RTP payload.
    ///
    /// Returns `None` for an empty payload and for an FU-A payload too short
    /// to carry its FU header. Truncated STAP-A data never fails: the walk
    /// stops at the first unit that does not fit.
    pub fn parse(payload: &'a [u8]) -> Option<Self> {
        let first = *payload.first()?;

        match NalType::from_header(first) {
            NalType::STAP_A => Some(Self::StapA(parse_stap_a(payload))),
            NalType::FU_A => parse_fu_a(payload).map(Self::FuA),
            _ => NalUnit::new(payload).map(Self::Single),
        }
    }

    /// Classified NAL units carried whole in this payload.
    ///
    /// A fragment carries no complete unit and yields nothing.
    pub fn nal_units(&self) -> &[NalUnit<'a>] {
        match self {
            Self::Single(nal) => std::slice::from_ref(nal),
            Self::StapA(units) => units,
            Self::FuA(_) => &[],
        }
    }
}

/// Walk a STAP-A payload (RFC 6184 §5.7.1).
///
/// ```text
/// [STAP-A hdr][size 16 BE][NALU 1][size 16 BE][NALU 2]...
/// ```
///
/// Stops silently when fewer than two length bytes remain or a declared size
/// runs past the end. Zero-length units are skipped.
fn parse_stap_a(payload: &[u8]) -> Vec<NalUnit<'_>> {
    let data = &payload[1..];
    let mut units = Vec::new();
    let mut offset = 0usize;

    while offset + STAP_A_LENGTH_PREFIX <= data.len() {
        let nal_len = u16::from_be_bytes([data[offset], data[offset + 1]]) as usize;
        offset += STAP_A_LENGTH_PREFIX;

        if offset + nal_len > data.len() {
            tracing::trace!(
                declared = nal_len,
                remaining = data.len() - offset,
                "STAP-A unit truncated, stopping"
            );
            break;
        }

        if let Some(nal) = NalUnit::new(&data[offset..offset + nal_len]) {
            units.push(nal);
        }
        offset += nal_len;
    }

    units
}

fn parse_fu_a(payload: &[u8]) -> Option<Fragment<'_>> {
    if payload.len() < 2 {
        tracing::trace!(size = payload.len(), "FU-A payload without FU header");
        return None;
    }

    let indicator = payload[0];
    let fu_header = payload[1];

    Some(Fragment {
        indicator,
        start: fu_header & 0x80 != 0,
        end: fu_header & 0x40 != 0,
        nal_type: NalType::from_header(fu_header),
        size: payload.len(),
        data: &payload[2..],
    })
}

/// Split an H.264 Annex B bitstream into NAL units, start codes removed.
///
/// A unit begins after each `00 00 01`; a zero byte right before it makes it
/// a 4-byte `00 00 00 01` code and is not part of the preceding unit.
/// Leading bytes before the first start code and empty units are dropped.
pub fn extract_nal_units(data: &[u8]) -> Vec<Vec<u8>> {
    // (offset of the start code, offset of the NAL header byte)
    let mut bounds: Vec<(usize, usize)> = Vec::new();
    let mut pos = 0usize;

    while pos + 3 <= data.len() {
        if data[pos..pos + 3] != [0, 0, 1] {
            pos += 1;
            continue;
        }
        let code = if pos > 0 && data[pos - 1] == 0 { pos - 1 } else { pos };
        bounds.push((code, pos + 3));
        pos += 3;
    }

    bounds
        .iter()
        .enumerate()
        .filter_map(|(i, &(_, begin))| {
            let end = bounds.get(i + 1).map_or(data.len(), |&(next, _)| next);
            (begin < end).then(|| data[begin..end].to_vec())
        })
        .collect()
}

/// Most recent SPS and PPS seen on a stream, NAL header byte included.
///
/// Kept so the stream can be described in SDP terms (RFC 6184 §8.1).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSets {
    pub sps: Option<Vec<u8>>,
    pub pps: Option<Vec<u8>>,
}

impl ParameterSets {
    /// Remember `nal` if it is an SPS or PPS. Returns whether it was stored.
    pub fn update(&mut self, nal: &NalUnit<'_>) -> bool {
        let slot = match nal.nal_type() {
            NalType::SPS => &mut self.sps,
            NalType::PPS => &mut self.pps,
            _ => return false,
        };
        if slot.as_deref() == Some(nal.data()) {
            return false;
        }
        *slot = Some(nal.data().to_vec());
        true
    }

    /// `profile-level-id` from the SPS: bytes 1–3 are profile_idc,
    /// constraint flags and level_idc.
    pub fn profile_level_id(&self) -> Option<String> {
        let sps = self.sps.as_deref()?;
        if sps.len() < 4 {
            return None;
        }
        Some(format!("{:02x}{:02x}{:02x}", sps[1], sps[2], sps[3]))
    }

    /// `sprop-parameter-sets` value: base64 SPS and PPS, comma separated.
    pub fn sprop_parameter_sets(&self) -> Option<String> {
        let sps = self.sps.as_deref()?;
        let pps = self.pps.as_deref()?;
        Some(format!(
            "{},{}",
            BASE64_STANDARD.encode(sps),
            BASE64_STANDARD.encode(pps)
        ))
    }
}
