use std::borrow::Cow;

use crate::error::DecodeError;

/// Fixed DNS header size; anything shorter is malformed.
pub const DNS_HEADER_LEN: usize = 12;

/// OPT pseudo-RR type carrying EDNS.
pub const TYPE_OPT: u16 = 41;

/// Pointer indirections allowed while expanding one name.
const MAX_POINTER_HOPS: usize = 10;

/// Wire-format names are capped at 255 octets.
const MAX_WIRE_NAME: usize = 255;

/// Response codes the aggregator breaks out.
pub mod rcode {
    pub const NOERROR: u8 = 0;
    pub const FORMERR: u8 = 1;
    pub const SERVFAIL: u8 = 2;
    pub const NXDOMAIN: u8 = 3;
    pub const NOTIMP: u8 = 4;
    pub const REFUSED: u8 = 5;
}

/// The fixed 12-byte DNS header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DnsHeader {
    pub id: u16,
    /// false = query, true = reply
    pub qr: bool,
    pub opcode: u8,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub rcode: u8,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl DnsHeader {
    /// Reads the header from the start of a DNS payload.
    pub fn parse(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < DNS_HEADER_LEN {
            return Err(DecodeError::TooShort {
                layer: "DNS",
                needed: DNS_HEADER_LEN,
                have: payload.len(),
            });
        }

        let flags = read_u16(payload, 2)?;

        Ok(DnsHeader {
            id: read_u16(payload, 0)?,
            qr: flags & 0x8000 != 0,
            opcode: ((flags >> 11) & 0x0F) as u8,
            aa: flags & 0x0400 != 0,
            tc: flags & 0x0200 != 0,
            rd: flags & 0x0100 != 0,
            ra: flags & 0x0080 != 0,
            rcode: (flags & 0x000F) as u8,
            qdcount: read_u16(payload, 4)?,
            ancount: read_u16(payload, 6)?,
            nscount: read_u16(payload, 8)?,
            arcount: read_u16(payload, 10)?,
        })
    }

    pub fn is_reply(&self) -> bool {
        self.qr
    }
}

/// First entry of the question section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    /// Absolute name with its trailing dot; the root is `"."`.
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
}

/// Everything the aggregator needs from one DNS payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DnsMessage {
    pub header: Option<DnsHeader>,
    pub question: Option<DnsQuestion>,
    pub has_edns: bool,
}

/// Decodes what can be decoded from a DNS payload.
///
/// Never fails as a whole: a short payload yields no header, a broken
/// question yields no question, and a record walk that runs off the end just
/// means no EDNS was seen.
pub fn decode_message(payload: &[u8]) -> DnsMessage {
    let header = match DnsHeader::parse(payload) {
        Ok(h) => h,
        Err(_) => return DnsMessage::default(),
    };

    let mut message = DnsMessage {
        header: Some(header),
        question: None,
        has_edns: false,
    };

    if header.qdcount == 0 {
        message.has_edns = scan_for_opt(payload, &header, DNS_HEADER_LEN).unwrap_or(false);
        return message;
    }

    match parse_question(payload, DNS_HEADER_LEN) {
        Ok((question, next)) => {
            message.question = Some(question);
            message.has_edns = skip_questions(payload, next, header.qdcount - 1)
                .and_then(|offset| scan_for_opt(payload, &header, offset))
                .unwrap_or(false);
        }
        Err(e) => log::trace!("question not decodable: {}", e),
    }

    message
}

/// Parses one question entry at `offset`; returns it and the offset after it.
fn parse_question(payload: &[u8], offset: usize) -> Result<(DnsQuestion, usize), DecodeError> {
    let (name, pos) = read_name(payload, offset)?;
    let qtype = read_u16(payload, pos)?;
    let qclass = read_u16(payload, pos + 2)?;
    Ok((DnsQuestion { name, qtype, qclass }, pos + 4))
}

fn skip_questions(payload: &[u8], mut offset: usize, count: u16) -> Result<usize, DecodeError> {
    for _ in 0..count {
        offset = skip_name(payload, offset)? + 4;
    }
    Ok(offset)
}

/// Walks answer and authority records, then looks for an OPT record in the
/// additional section.
fn scan_for_opt(payload: &[u8], header: &DnsHeader, mut offset: usize) -> Result<bool, DecodeError> {
    let skipped = u32::from(header.ancount) + u32::from(header.nscount);
    for _ in 0..skipped {
        offset = skip_record(payload, offset)?.1;
    }
    for _ in 0..header.arcount {
        let (rtype, next) = skip_record(payload, offset)?;
        if rtype == TYPE_OPT {
            return Ok(true);
        }
        offset = next;
    }
    Ok(false)
}

/// Skips one resource record, returning its type and the offset after it.
fn skip_record(payload: &[u8], offset: usize) -> Result<(u16, usize), DecodeError> {
    let pos = skip_name(payload, offset)?;
    let rtype = read_u16(payload, pos)?;
    // type(2) class(2) ttl(4) rdlength(2)
    let rdlength = usize::from(read_u16(payload, pos + 8)?);
    let end = pos + 10 + rdlength;
    if end > payload.len() {
        return Err(DecodeError::TooShort {
            layer: "DNS record",
            needed: end,
            have: payload.len(),
        });
    }
    Ok((rtype, end))
}

/// Expands a possibly-compressed name starting at `offset`.
///
/// Returns the presentation-form name (trailing dot included) and the offset
/// just past the name as it appears at `offset`.
fn read_name(payload: &[u8], offset: usize) -> Result<(String, usize), DecodeError> {
    let mut name = String::new();
    let mut pos = offset;
    let mut resume_at = None;
    let mut hops = 0;
    let mut wire_len = 0;

    loop {
        let len = *payload
            .get(pos)
            .ok_or(DecodeError::BadName("offset out of bounds"))?;
        pos += 1;

        match len & 0xC0 {
            0x00 if len == 0 => break,
            0x00 => {
                let len = usize::from(len);
                let label = payload
                    .get(pos..pos + len)
                    .ok_or(DecodeError::BadName("label exceeds payload"))?;
                wire_len += len + 1;
                if wire_len > MAX_WIRE_NAME {
                    return Err(DecodeError::BadName("name too long"));
                }
                push_label(&mut name, label);
                name.push('.');
                pos += len;
            }
            0xC0 => {
                let low = *payload
                    .get(pos)
                    .ok_or(DecodeError::BadName("incomplete compression pointer"))?;
                hops += 1;
                if hops > MAX_POINTER_HOPS {
                    return Err(DecodeError::BadName("too many compression pointers"));
                }
                if resume_at.is_none() {
                    resume_at = Some(pos + 1);
                }
                pos = (usize::from(len & 0x3F) << 8) | usize::from(low);
            }
            _ => return Err(DecodeError::BadName("unsupported label type")),
        }
    }

    if name.is_empty() {
        name.push('.');
    }
    Ok((name, resume_at.unwrap_or(pos)))
}

/// Steps over a name without expanding it.
fn skip_name(payload: &[u8], mut pos: usize) -> Result<usize, DecodeError> {
    loop {
        let len = *payload
            .get(pos)
            .ok_or(DecodeError::BadName("offset out of bounds"))?;
        match len & 0xC0 {
            0x00 if len == 0 => return Ok(pos + 1),
            0x00 => pos += 1 + usize::from(len),
            0xC0 => {
                if pos + 1 >= payload.len() {
                    return Err(DecodeError::BadName("incomplete compression pointer"));
                }
                return Ok(pos + 2);
            }
            _ => return Err(DecodeError::BadName("unsupported label type")),
        }
    }
}

/// Appends label bytes in presentation form: `.` and `\` are backslash
/// escaped, anything else that is not printable ASCII becomes `\DDD`.
fn push_label(name: &mut String, label: &[u8]) {
    for &b in label {
        match b {
            b'.' | b'\\' => {
                name.push('\\');
                name.push(char::from(b));
            }
            _ if b.is_ascii_graphic() => name.push(char::from(b)),
            _ => name.push_str(&format!("\\{:03}", b)),
        }
    }
}

fn read_u16(payload: &[u8], offset: usize) -> Result<u16, DecodeError> {
    match payload.get(offset..offset + 2) {
        Some(bytes) => Ok(u16::from_be_bytes([bytes[0], bytes[1]])),
        None => Err(DecodeError::TooShort {
            layer: "DNS",
            needed: offset + 2,
            have: payload.len(),
        }),
    }
}

/// Mnemonic for a query type, `TYPE<n>` for anything unlisted.
pub fn qtype_name(qtype: u16) -> Cow<'static, str> {
    let name = match qtype {
        1 => "A",
        2 => "NS",
        5 => "CNAME",
        6 => "SOA",
        12 => "PTR",
        13 => "HINFO",
        15 => "MX",
        16 => "TXT",
        17 => "RP",
        18 => "AFSDB",
        24 => "SIG",
        25 => "KEY",
        28 => "AAAA",
        29 => "LOC",
        33 => "SRV",
        35 => "NAPTR",
        36 => "KX",
        37 => "CERT",
        39 => "DNAME",
        41 => "OPT",
        43 => "DS",
        44 => "SSHFP",
        46 => "RRSIG",
        47 => "NSEC",
        48 => "DNSKEY",
        50 => "NSEC3",
        51 => "NSEC3PARAM",
        52 => "TLSA",
        59 => "CDS",
        60 => "CDNSKEY",
        64 => "SVCB",
        65 => "HTTPS",
        99 => "SPF",
        249 => "TKEY",
        250 => "TSIG",
        251 => "IXFR",
        252 => "AXFR",
        255 => "ANY",
        256 => "URI",
        257 => "CAA",
        _ => return Cow::Owned(format!("TYPE{}", qtype)),
    };
    Cow::Borrowed(name)
}

pub fn rcode_name(code: u8) -> Cow<'static, str> {
    let name = match code {
        rcode::NOERROR => "NOERROR",
        rcode::FORMERR => "FORMERR",
        rcode::SERVFAIL => "SERVFAIL",
        rcode::NXDOMAIN => "NXDOMAIN",
        rcode::NOTIMP => "NOTIMP",
        rcode::REFUSED => "REFUSED",
        6 => "YXDOMAIN",
        7 => "YXRRSET",
        8 => "NXRRSET",
        9 => "NOTAUTH",
        10 => "NOTZONE",
        _ => return Cow::Owned(format!("RCODE{}", code)),
    };
    Cow::Borrowed(name)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Wire-encodes `name` (dot separated, trailing dot optional).
    pub(crate) fn encode_name(name: &str) -> Vec<u8> {
        let mut out = Vec::new();
        for label in name.trim_end_matches('.').split('.').filter(|l| !l.is_empty()) {
            out.push(label.len() as u8);
            out.extend_from_slice(label.as_bytes());
        }
        out.push(0);
        out
    }

    pub(crate) fn header_bytes(id: u16, flags: u16, counts: [u16; 4]) -> Vec<u8> {
        let mut out = Vec::with_capacity(DNS_HEADER_LEN);
        out.extend_from_slice(&id.to_be_bytes());
        out.extend_from_slice(&flags.to_be_bytes());
        for c in counts {
            out.extend_from_slice(&c.to_be_bytes());
        }
        out
    }

    fn query(name: &str, qtype: u16) -> Vec<u8> {
        let mut msg = header_bytes(0x1234, 0x0100, [1, 0, 0, 0]);
        msg.extend(encode_name(name));
        msg.extend_from_slice(&qtype.to_be_bytes());
        msg.extend_from_slice(&1u16.to_be_bytes());
        msg
    }

    fn opt_record() -> Vec<u8> {
        // root name, type OPT, udp size 1232, ttl 0, rdlength 0
        vec![0, 0, 41, 0x04, 0xD0, 0, 0, 0, 0, 0, 0]
    }

    #[test]
    fn test_header_flags() {
        // reply, opcode 0, AA, RD, RA, NXDOMAIN
        let bytes = header_bytes(7, 0x8583, [1, 0, 1, 0]);
        let h = DnsHeader::parse(&bytes).unwrap();
        assert_eq!(h.id, 7);
        assert!(h.qr);
        assert!(h.aa);
        assert!(!h.tc);
        assert!(h.rd);
        assert!(h.ra);
        assert_eq!(h.opcode, 0);
        assert_eq!(h.rcode, rcode::NXDOMAIN);
        assert_eq!(h.qdcount, 1);
        assert_eq!(h.nscount, 1);
    }

    #[test]
    fn test_header_too_short() {
        let err = DnsHeader::parse(&[0u8; 11]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::TooShort {
                layer: "DNS",
                needed: 12,
                have: 11
            }
        );
        assert_eq!(decode_message(&[0u8; 5]), DnsMessage::default());
    }

    #[test]
    fn test_plain_question() {
        let msg = decode_message(&query("www.Example.com", 28));
        let q = msg.question.unwrap();
        assert_eq!(q.name, "www.Example.com.");
        assert_eq!(q.qtype, 28);
        assert_eq!(q.qclass, 1);
        assert!(!msg.has_edns);
        assert!(!msg.header.unwrap().qr);
    }

    #[test]
    fn test_root_question() {
        let msg = decode_message(&query(".", 2));
        assert_eq!(msg.question.unwrap().name, ".");
    }

    #[test]
    fn test_compressed_question_name() {
        // question name is a pointer back into a name placed after the header
        // by a hand-built message: "example.com" at offset 12 via a dummy
        // question 1, question 2 is "www" + pointer to 12.
        let mut msg = header_bytes(1, 0x0100, [2, 0, 0, 0]);
        msg.extend(encode_name("example.com"));
        msg.extend_from_slice(&[0, 1, 0, 1]);
        msg.extend_from_slice(&[3, b'w', b'w', b'w', 0xC0, 12]);
        msg.extend_from_slice(&[0, 1, 0, 1]);

        let (name, next) = read_name(&msg, 29).unwrap();
        assert_eq!(name, "www.example.com.");
        assert_eq!(next, 35);
    }

    #[test]
    fn test_pointer_loop_rejected() {
        let mut msg = header_bytes(1, 0x0100, [1, 0, 0, 0]);
        // pointer to itself
        msg.extend_from_slice(&[0xC0, 12, 0, 1, 0, 1]);
        let decoded = decode_message(&msg);
        assert!(decoded.header.is_some());
        assert!(decoded.question.is_none());
    }

    #[test]
    fn test_label_past_end_rejected() {
        let mut msg = header_bytes(1, 0x0100, [1, 0, 0, 0]);
        msg.extend_from_slice(&[10, b'a', b'b']);
        assert!(decode_message(&msg).question.is_none());
    }

    #[test]
    fn test_missing_qtype_drops_question() {
        let mut msg = header_bytes(1, 0x0100, [1, 0, 0, 0]);
        msg.extend(encode_name("example.com"));
        msg.push(0);
        assert!(decode_message(&msg).question.is_none());
    }

    #[test]
    fn test_non_printable_bytes_escaped() {
        let mut msg = header_bytes(1, 0x0100, [1, 0, 0, 0]);
        msg.extend_from_slice(&[2, b'a', b' ', 3, b'c', b'o', b'm', 0, 0, 1, 0, 1]);
        assert_eq!(decode_message(&msg).question.unwrap().name, "a\\032.com.");
    }

    #[test]
    fn test_dot_and_backslash_inside_label_escaped() {
        let mut msg = header_bytes(1, 0x0100, [1, 0, 0, 0]);
        msg.push(10);
        msg.extend_from_slice(b"foo.victim");
        msg.push(4);
        msg.extend_from_slice(b"a\\bc");
        msg.extend_from_slice(&[0, 0, 1, 0, 1]);
        assert_eq!(
            decode_message(&msg).question.unwrap().name,
            "foo\\.victim.a\\\\bc."
        );
    }

    #[test]
    fn test_edns_detected_in_query() {
        let mut msg = query("example.com", 1);
        msg[10..12].copy_from_slice(&1u16.to_be_bytes());
        msg.extend(opt_record());
        assert!(decode_message(&msg).has_edns);
    }

    #[test]
    fn test_edns_detected_after_answers() {
        let mut msg = header_bytes(9, 0x8180, [1, 1, 0, 1]);
        msg.extend(encode_name("example.com"));
        msg.extend_from_slice(&[0, 1, 0, 1]);
        // answer: pointer to question name, A IN, ttl 60, 4 bytes rdata
        msg.extend_from_slice(&[0xC0, 12, 0, 1, 0, 1, 0, 0, 0, 60, 0, 4, 192, 0, 2, 1]);
        msg.extend(opt_record());
        let decoded = decode_message(&msg);
        assert!(decoded.has_edns);
        assert_eq!(decoded.question.unwrap().name, "example.com.");
    }

    #[test]
    fn test_truncated_additional_is_not_edns() {
        let mut msg = query("example.com", 1);
        msg[10..12].copy_from_slice(&1u16.to_be_bytes());
        msg.extend_from_slice(&[0, 0, 41]);
        let decoded = decode_message(&msg);
        assert!(!decoded.has_edns);
        assert!(decoded.question.is_some());
    }

    #[test]
    fn test_type_names() {
        assert_eq!(qtype_name(1), "A");
        assert_eq!(qtype_name(28), "AAAA");
        assert_eq!(qtype_name(65), "HTTPS");
        assert_eq!(qtype_name(4242), "TYPE4242");
        assert_eq!(rcode_name(rcode::REFUSED), "REFUSED");
        assert_eq!(rcode_name(15), "RCODE15");
    }
}
