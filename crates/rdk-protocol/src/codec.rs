//! 基础编解码工具
//!
//! 所有读取函数在数据不足时返回 `ProtocolError`，不会 panic。

use crate::ProtocolError;
use bytes::{Buf, BufMut};

/// 确保缓冲区剩余字节数足够
#[inline]
pub fn ensure_remaining<B: Buf>(buf: &B, needed: usize) -> Result<(), ProtocolError> {
    if buf.remaining() < needed {
        return Err(ProtocolError::InvalidLength {
            expected: needed,
            actual: buf.remaining(),
        });
    }
    Ok(())
}

pub fn get_u8<B: Buf>(buf: &mut B) -> Result<u8, ProtocolError> {
    ensure_remaining(buf, 1)?;
    Ok(buf.get_u8())
}

pub fn get_u32<B: Buf>(buf: &mut B) -> Result<u32, ProtocolError> {
    ensure_remaining(buf, 4)?;
    Ok(buf.get_u32_le())
}

pub fn get_u64<B: Buf>(buf: &mut B) -> Result<u64, ProtocolError> {
    ensure_remaining(buf, 8)?;
    Ok(buf.get_u64_le())
}

pub fn get_f64<B: Buf>(buf: &mut B) -> Result<f64, ProtocolError> {
    ensure_remaining(buf, 8)?;
    Ok(buf.get_f64_le())
}

/// 读取布尔值（只接受 0/1）
pub fn get_bool<B: Buf>(buf: &mut B, field: &str) -> Result<bool, ProtocolError> {
    match get_u8(buf)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(ProtocolError::InvalidValue {
            field: field.to_string(),
            value: other.to_string(),
        }),
    }
}

pub fn put_bool<B: BufMut>(buf: &mut B, value: bool) {
    buf.put_u8(u8::from(value));
}

/// 写入字符串（`u16` 长度前缀）
pub fn put_str<B: BufMut>(buf: &mut B, value: &str) -> Result<(), ProtocolError> {
    let len = u16::try_from(value.len())
        .map_err(|_| ProtocolError::Malformed(format!("string too long: {} bytes", value.len())))?;
    buf.put_u16_le(len);
    buf.put_slice(value.as_bytes());
    Ok(())
}

/// 读取字符串（`u16` 长度前缀）
pub fn get_str<B: Buf>(buf: &mut B) -> Result<String, ProtocolError> {
    ensure_remaining(buf, 2)?;
    let len = buf.get_u16_le() as usize;
    ensure_remaining(buf, len)?;
    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}

/// 写入字符串列表（`u16` 数量前缀）
pub fn put_str_list<B, S>(buf: &mut B, items: &[S]) -> Result<(), ProtocolError>
where
    B: BufMut,
    S: AsRef<str>,
{
    let count = u16::try_from(items.len())
        .map_err(|_| ProtocolError::Malformed(format!("too many strings: {}", items.len())))?;
    buf.put_u16_le(count);
    for item in items {
        put_str(buf, item.as_ref())?;
    }
    Ok(())
}

/// 读取字符串列表
pub fn get_str_list<B: Buf>(buf: &mut B) -> Result<Vec<String>, ProtocolError> {
    ensure_remaining(buf, 2)?;
    let count = buf.get_u16_le() as usize;
    let mut items = Vec::with_capacity(count.min(256));
    for _ in 0..count {
        items.push(get_str(buf)?);
    }
    Ok(items)
}

pub fn put_f64_array<B: BufMut, const N: usize>(buf: &mut B, values: &[f64; N]) {
    for value in values {
        buf.put_f64_le(*value);
    }
}

/// 读取定长 `f64` 数组，拒绝 NaN/Inf
pub fn get_f64_array<B: Buf, const N: usize>(
    buf: &mut B,
    field: &str,
) -> Result<[f64; N], ProtocolError> {
    ensure_remaining(buf, N * 8)?;
    let mut values = [0.0; N];
    for (i, slot) in values.iter_mut().enumerate() {
        let value = buf.get_f64_le();
        if !value.is_finite() {
            return Err(ProtocolError::InvalidValue {
                field: format!("{field}[{i}]"),
                value: value.to_string(),
            });
        }
        *slot = value;
    }
    Ok(values)
}
