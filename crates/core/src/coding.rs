//! Primitive value bodies
//!
//! Unsigned integers are little-endian with trailing zero bytes trimmed, so
//! zero has an empty body. Signed integers are zig-zag mapped first. Floats
//! are fixed-width little-endian IEEE values.

use crate::error::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Append the body of an unsigned integer.
pub fn append_uint(dst: &mut Vec<u8>, mut v: u64) {
    while v != 0 {
        dst.push(v as u8);
        v >>= 8;
    }
}

/// Body of an unsigned integer.
pub fn encode_uint(v: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(8);
    append_uint(&mut out, v);
    out
}

/// Decode an unsigned integer body.
pub fn decode_uint(body: &[u8]) -> Result<u64> {
    if body.len() > 8 {
        return Err(Error::BadValue(format!(
            "uint body of {} bytes",
            body.len()
        )));
    }
    Ok(body
        .iter()
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

/// Zig-zag map a signed integer onto the unsigned range.
#[inline]
pub fn zigzag(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

/// Inverse of [`zigzag`].
#[inline]
pub fn unzigzag(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

/// Append the body of a signed integer.
pub fn append_int(dst: &mut Vec<u8>, v: i64) {
    append_uint(dst, zigzag(v));
}

/// Body of a signed integer.
pub fn encode_int(v: i64) -> Vec<u8> {
    encode_uint(zigzag(v))
}

/// Decode a signed integer body.
pub fn decode_int(body: &[u8]) -> Result<i64> {
    decode_uint(body).map(unzigzag)
}

/// Body of a 64-bit float.
pub fn encode_float64(v: f64) -> Vec<u8> {
    let mut out = vec![0u8; 8];
    LittleEndian::write_f64(&mut out, v);
    out
}

/// Decode a 64-bit float body.
pub fn decode_float64(body: &[u8]) -> Result<f64> {
    check_width("float64", body, 8)?;
    Ok(LittleEndian::read_f64(body))
}

/// Body of a 32-bit float.
pub fn encode_float32(v: f32) -> Vec<u8> {
    let mut out = vec![0u8; 4];
    LittleEndian::write_f32(&mut out, v);
    out
}

/// Decode a 32-bit float body.
pub fn decode_float32(body: &[u8]) -> Result<f32> {
    check_width("float32", body, 4)?;
    Ok(LittleEndian::read_f32(body))
}

/// Body of a half-precision float, rounded from `v`.
pub fn encode_float16(v: f32) -> Vec<u8> {
    let mut out = vec![0u8; 2];
    LittleEndian::write_u16(&mut out, f32_to_f16_bits(v));
    out
}

/// Decode a half-precision float body.
pub fn decode_float16(body: &[u8]) -> Result<f32> {
    check_width("float16", body, 2)?;
    Ok(f16_bits_to_f32(LittleEndian::read_u16(body)))
}

/// Body of a bool.
pub fn encode_bool(v: bool) -> Vec<u8> {
    vec![u8::from(v)]
}

/// Decode a bool body.
pub fn decode_bool(body: &[u8]) -> Result<bool> {
    match body {
        [0] => Ok(false),
        [1] => Ok(true),
        _ => Err(Error::BadValue(format!("bool body {:?}", body))),
    }
}

/// Body of an IP address.
pub fn encode_ip(ip: IpAddr) -> Vec<u8> {
    match ip {
        IpAddr::V4(a) => a.octets().to_vec(),
        IpAddr::V6(a) => a.octets().to_vec(),
    }
}

/// Decode an IP address body (4 or 16 bytes).
pub fn decode_ip(body: &[u8]) -> Result<IpAddr> {
    match body.len() {
        4 => {
            let mut b = [0u8; 4];
            b.copy_from_slice(body);
            Ok(IpAddr::V4(Ipv4Addr::from(b)))
        }
        16 => {
            let mut b = [0u8; 16];
            b.copy_from_slice(body);
            Ok(IpAddr::V6(Ipv6Addr::from(b)))
        }
        n => Err(Error::BadValue(format!("ip body of {} bytes", n))),
    }
}

/// Body of a network: the masked address followed by the mask.
///
/// Returns `BadValue` when `prefix` exceeds the address width.
pub fn encode_net(ip: IpAddr, prefix: u8) -> Result<Vec<u8>> {
    let addr = encode_ip(ip);
    let bits = addr.len() * 8;
    if usize::from(prefix) > bits {
        return Err(Error::BadValue(format!(
            "prefix /{} on a {}-bit address",
            prefix, bits
        )));
    }
    let mask: Vec<u8> = (0..addr.len())
        .map(|i| {
            let covered = usize::from(prefix).saturating_sub(i * 8).min(8);
            if covered == 0 {
                0
            } else {
                0xffu8 << (8 - covered)
            }
        })
        .collect();
    let mut out: Vec<u8> = addr.iter().zip(&mask).map(|(a, m)| a & m).collect();
    out.extend_from_slice(&mask);
    Ok(out)
}

/// Decode a network body into its address and prefix length.
pub fn decode_net(body: &[u8]) -> Result<(IpAddr, u8)> {
    if body.len() != 8 && body.len() != 32 {
        return Err(Error::BadValue(format!("net body of {} bytes", body.len())));
    }
    let (addr, mask) = body.split_at(body.len() / 2);
    let ones: u32 = mask.iter().map(|b| b.count_ones()).sum();
    Ok((decode_ip(addr)?, ones as u8))
}

/// Render nanoseconds since the Unix epoch as RFC 3339.
pub fn format_time(nanos: i64) -> String {
    let secs = nanos.div_euclid(1_000_000_000);
    let sub = nanos.rem_euclid(1_000_000_000) as u32;
    match chrono::DateTime::from_timestamp(secs, sub) {
        Some(t) => t.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true),
        None => nanos.to_string(),
    }
}

/// Render a duration in nanoseconds using the largest exact unit.
pub fn format_duration(nanos: i64) -> String {
    const UNITS: [(i64, &str); 6] = [
        (3_600_000_000_000, "h"),
        (60_000_000_000, "m"),
        (1_000_000_000, "s"),
        (1_000_000, "ms"),
        (1_000, "us"),
        (1, "ns"),
    ];
    if nanos == 0 {
        return "0s".to_string();
    }
    for (scale, unit) in UNITS {
        if nanos % scale == 0 {
            return format!("{}{}", nanos / scale, unit);
        }
    }
    format!("{}ns", nanos)
}

fn check_width(what: &str, body: &[u8], width: usize) -> Result<()> {
    if body.len() != width {
        return Err(Error::BadValue(format!(
            "{} body of {} bytes",
            what,
            body.len()
        )));
    }
    Ok(())
}

fn f32_to_f16_bits(v: f32) -> u16 {
    let x = v.to_bits();
    let sign = ((x >> 16) & 0x8000) as u16;
    let exp = ((x >> 23) & 0xff) as i32;
    let man = x & 0x007f_ffff;
    if exp == 0xff {
        // inf or nan
        let nan = if man != 0 { 0x0200 } else { 0 };
        return sign | 0x7c00 | nan;
    }
    let e = exp - 127 + 15;
    if e >= 0x1f {
        return sign | 0x7c00;
    }
    if e <= 0 {
        if e < -10 {
            return sign;
        }
        let m = man | 0x0080_0000;
        let shift = (14 - e) as u32;
        let half = 1u32 << (shift - 1);
        let mut r = m >> shift;
        let rem = m & ((1 << shift) - 1);
        if rem > half || (rem == half && r & 1 == 1) {
            r += 1;
        }
        return sign | r as u16;
    }
    let mut r = ((e as u32) << 10) | (man >> 13);
    let rem = man & 0x1fff;
    if rem > 0x1000 || (rem == 0x1000 && r & 1 == 1) {
        r += 1;
    }
    sign | r as u16
}

fn f16_bits_to_f32(h: u16) -> f32 {
    let sign = u32::from(h & 0x8000) << 16;
    let exp = u32::from((h >> 10) & 0x1f);
    let man = u32::from(h & 0x03ff);
    let bits = match (exp, man) {
        (0, 0) => sign,
        (0, _) => {
            // subnormal: normalize the mantissa
            let mut e = 127 - 15 + 1;
            let mut m = man;
            while m & 0x0400 == 0 {
                m <<= 1;
                e -= 1;
            }
            sign | (e << 23) | ((m & 0x03ff) << 13)
        }
        (0x1f, 0) => sign | 0x7f80_0000,
        (0x1f, _) => sign | 0x7fc0_0000 | (man << 13),
        _ => sign | ((exp + 127 - 15) << 23) | (man << 13),
    };
    f32::from_bits(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uint_trims_trailing_zeros() {
        assert!(encode_uint(0).is_empty());
        assert_eq!(encode_uint(1), vec![1]);
        assert_eq!(encode_uint(0x0100), vec![0, 1]);
        assert_eq!(decode_uint(&encode_uint(u64::MAX)).unwrap(), u64::MAX);
        assert!(decode_uint(&[0; 9]).is_err());
    }

    #[test]
    fn test_int_zigzag() {
        assert_eq!(encode_int(0), Vec::<u8>::new());
        assert_eq!(encode_int(-1), vec![1]);
        assert_eq!(encode_int(1), vec![2]);
        for v in [i64::MIN, -300, -1, 0, 1, 300, i64::MAX] {
            assert_eq!(decode_int(&encode_int(v)).unwrap(), v);
        }
    }

    #[test]
    fn test_floats() {
        assert_eq!(decode_float64(&encode_float64(1.5)).unwrap(), 1.5);
        assert_eq!(decode_float32(&encode_float32(-2.25)).unwrap(), -2.25);
        assert!(decode_float64(&[0; 4]).is_err());
    }

    #[test]
    fn test_float16_exact_values() {
        for v in [0.0f32, 1.0, -2.0, 0.5, 65504.0, 6.1035156e-5] {
            assert_eq!(decode_float16(&encode_float16(v)).unwrap(), v);
        }
        assert!(decode_float16(&encode_float16(f32::INFINITY))
            .unwrap()
            .is_infinite());
        assert!(decode_float16(&encode_float16(f32::NAN)).unwrap().is_nan());
        // subnormal half
        let tiny = 5.9604645e-8f32;
        assert_eq!(decode_float16(&encode_float16(tiny)).unwrap(), tiny);
    }

    #[test]
    fn test_bool() {
        assert!(decode_bool(&encode_bool(true)).unwrap());
        assert!(!decode_bool(&encode_bool(false)).unwrap());
        assert!(decode_bool(&[2]).is_err());
    }

    #[test]
    fn test_ip_and_net() {
        let ip: IpAddr = "10.1.2.3".parse().unwrap();
        assert_eq!(decode_ip(&encode_ip(ip)).unwrap(), ip);

        let net = encode_net(ip, 16).unwrap();
        assert_eq!(net, vec![10, 1, 0, 0, 255, 255, 0, 0]);
        let (addr, prefix) = decode_net(&net).unwrap();
        assert_eq!(addr, "10.1.0.0".parse::<IpAddr>().unwrap());
        assert_eq!(prefix, 16);
        assert!(encode_net(ip, 33).is_err());
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_time(1_500_000_000), "1970-01-01T00:00:01.500Z");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(90_000_000_000), "90s");
        assert_eq!(format_duration(120_000_000_000), "2m");
        assert_eq!(format_duration(1_500), "1500ns");
        assert_eq!(format_duration(2_000), "2us");
    }
}
