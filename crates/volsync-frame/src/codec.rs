use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::cobs::{self, DELIMITER};
use crate::error::{FrameError, Result};
use crate::message::{
    AddItem, Message, MessageKind, RemoveItem, Rgb, SetDefaultEndpoint, Settings, UpdateVolume,
};
use crate::registry::KindRegistry;

/// Longest display name sent on the wire, in bytes.
pub const MAX_NAME_LEN: usize = u8::MAX as usize;

/// Default upper bound for one encoded frame, delimiter excluded.
pub const DEFAULT_MAX_FRAME: usize = 1024;

/// Encodes [`Message`]s into COBS frames and back.
///
/// Payload layout: discriminant (1B) followed by the kind's fields in
/// declaration order.
/// ```text
/// int32   4B little-endian
/// uint8   1B
/// bool    1B (0 = false, anything else = true)
/// string  1B byte length + UTF-8 bytes (max 255)
/// rgb     3B r, g, b
/// ```
/// The codec is stateless; accumulating bytes up to a delimiter is the job of
/// [`FrameReader`](crate::reader::FrameReader).
#[derive(Debug, Clone)]
pub struct FrameCodec {
    registry: KindRegistry,
}

impl FrameCodec {
    /// Seal `registry` into a codec.
    pub fn new(registry: KindRegistry) -> Self {
        Self { registry }
    }

    /// Codec for the standard discriminant table.
    pub fn standard() -> Self {
        Self::new(KindRegistry::standard())
    }

    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    /// Encode one message into a complete frame, delimiter included.
    pub fn encode(&self, message: &Message) -> Result<Bytes> {
        let mut dst = BytesMut::new();
        self.encode_into(message, &mut dst)?;
        Ok(dst.freeze())
    }

    /// Encode one message and append the frame to `dst`.
    pub fn encode_into(&self, message: &Message, dst: &mut BytesMut) -> Result<()> {
        let kind = message.kind();
        let discriminant = self
            .registry
            .discriminant(kind)
            .ok_or(FrameError::UnregisteredKind(kind))?;

        let mut payload = BytesMut::with_capacity(32);
        payload.put_u8(discriminant);
        write_fields(message, &mut payload);

        cobs::encode_into(&payload, dst);
        Ok(())
    }

    /// Decode one frame.
    ///
    /// `frame` is the stuffed body; a single trailing delimiter is accepted
    /// and ignored.
    pub fn decode(&self, frame: &[u8]) -> Result<Message> {
        let body = match frame.split_last() {
            Some((&DELIMITER, body)) => body,
            _ => frame,
        };

        let payload = cobs::decode(body)?;
        let (&discriminant, fields) = payload
            .split_first()
            .ok_or(FrameError::FrameCorrupt { len: body.len() })?;

        let kind = self
            .registry
            .kind(discriminant)
            .ok_or(FrameError::UnknownMessageKind(discriminant))?;

        let mut reader = FieldReader { kind, buf: fields };
        let message = read_fields(kind, &mut reader)?;

        if reader.buf.has_remaining() {
            tracing::trace!(
                %kind,
                extra = reader.buf.remaining(),
                "ignoring trailing payload bytes"
            );
        }

        Ok(message)
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::standard()
    }
}

fn write_fields(message: &Message, dst: &mut BytesMut) {
    match message {
        Message::HandshakeRequest | Message::Acknowledgment | Message::Heartbeat => {}
        Message::AddItem(item) => {
            dst.put_i32_le(item.id);
            put_string(dst, &item.display_name);
            dst.put_u8(item.volume);
            put_bool(dst, item.is_muted);
            put_bool(dst, item.is_device);
            dst.put_u8(item.device_flow);
        }
        Message::RemoveItem(item) => {
            dst.put_i32_le(item.id);
            put_bool(dst, item.is_device);
            dst.put_u8(item.device_flow);
        }
        Message::UpdateVolume(update) => {
            dst.put_i32_le(update.id);
            dst.put_u8(update.volume);
            put_bool(dst, update.is_muted);
            put_bool(dst, update.is_device);
            dst.put_u8(update.device_flow);
        }
        Message::SetDefaultEndpoint(endpoint) => {
            dst.put_i32_le(endpoint.id);
            dst.put_u8(endpoint.device_flow);
        }
        Message::Settings(settings) => {
            put_bool(dst, settings.display_new_session);
            put_bool(dst, settings.sleep_when_inactive);
            dst.put_i32_le(settings.sleep_after_seconds);
            put_bool(dst, settings.loop_around_items);
            dst.put_i32_le(settings.acceleration_percentage);
            dst.put_i32_le(settings.double_tap_time_ms);
            put_rgb(dst, settings.volume_min_color);
            put_rgb(dst, settings.volume_max_color);
            put_rgb(dst, settings.mix_channel_a_color);
            put_rgb(dst, settings.mix_channel_b_color);
        }
    }
}

fn read_fields(kind: MessageKind, src: &mut FieldReader<'_>) -> Result<Message> {
    let message = match kind {
        MessageKind::HandshakeRequest => Message::HandshakeRequest,
        MessageKind::Acknowledgment => Message::Acknowledgment,
        MessageKind::Heartbeat => Message::Heartbeat,
        MessageKind::AddItem => Message::AddItem(AddItem {
            id: src.i32()?,
            display_name: src.string()?,
            volume: src.u8()?,
            is_muted: src.bool()?,
            is_device: src.bool()?,
            device_flow: src.u8()?,
        }),
        MessageKind::RemoveItem => Message::RemoveItem(RemoveItem {
            id: src.i32()?,
            is_device: src.bool()?,
            device_flow: src.u8()?,
        }),
        MessageKind::UpdateVolume => Message::UpdateVolume(UpdateVolume {
            id: src.i32()?,
            volume: src.u8()?,
            is_muted: src.bool()?,
            is_device: src.bool()?,
            device_flow: src.u8()?,
        }),
        MessageKind::SetDefaultEndpoint => Message::SetDefaultEndpoint(SetDefaultEndpoint {
            id: src.i32()?,
            device_flow: src.u8()?,
        }),
        MessageKind::Settings => Message::Settings(Settings {
            display_new_session: src.bool()?,
            sleep_when_inactive: src.bool()?,
            sleep_after_seconds: src.i32()?,
            loop_around_items: src.bool()?,
            acceleration_percentage: src.i32()?,
            double_tap_time_ms: src.i32()?,
            volume_min_color: src.rgb()?,
            volume_max_color: src.rgb()?,
            mix_channel_a_color: src.rgb()?,
            mix_channel_b_color: src.rgb()?,
        }),
    };
    Ok(message)
}

fn put_bool(dst: &mut BytesMut, value: bool) {
    dst.put_u8(u8::from(value));
}

fn put_rgb(dst: &mut BytesMut, color: Rgb) {
    dst.put_slice(&[color.r, color.g, color.b]);
}

fn put_string(dst: &mut BytesMut, value: &str) {
    let mut end = value.len().min(MAX_NAME_LEN);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    dst.put_u8(end as u8);
    dst.put_slice(&value.as_bytes()[..end]);
}

/// Bounds-checked field cursor over a decoded payload.
struct FieldReader<'a> {
    kind: MessageKind,
    buf: &'a [u8],
}

impl FieldReader<'_> {
    fn need(&self, needed: usize) -> Result<()> {
        if self.buf.remaining() < needed {
            return Err(FrameError::TruncatedPayload {
                kind: self.kind,
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    fn bool(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    fn i32(&mut self) -> Result<i32> {
        self.need(4)?;
        Ok(self.buf.get_i32_le())
    }

    fn rgb(&mut self) -> Result<Rgb> {
        self.need(3)?;
        Ok(Rgb::new(
            self.buf.get_u8(),
            self.buf.get_u8(),
            self.buf.get_u8(),
        ))
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u8()? as usize;
        self.need(len)?;
        let text = String::from_utf8_lossy(&self.buf[..len]).into_owned();
        self.buf.advance(len);
        Ok(text)
    }
}
