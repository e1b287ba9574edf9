//! The detector log format: one image per line,
//! `<image> <count> $d` followed by `count` records of
//! `<score> <x1> <y1> <x2> <y2> <lm_0> ... <lm_9>`.

use crate::detection::{BBox, Detection, ImageDetectionSet, LANDMARK_SLOTS, Landmarks};
use crate::error::{DecodeError, DecodeErrorKind, EncodeError};

/// Token separating the line header from the detection payload.
pub const MARKER: &str = "$d";
/// Tokens per detection record: score, four box coordinates, landmark slots.
pub const RECORD_TOKENS: usize = 1 + 4 + LANDMARK_SLOTS;

/// One decoded line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// 1-based line number in the source.
    pub line: usize,
    pub image: String,
    pub detections: Vec<Detection>,
}

/// Decode every non-blank line of a log, in source order.
pub fn decode(text: &str) -> Result<Vec<LogEntry>, DecodeError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            let line_no = idx + 1;
            let (image, detections) = decode_line(line, line_no)?;
            Ok(LogEntry {
                line: line_no,
                image,
                detections,
            })
        })
        .collect()
}

/// Decode a single line. `line_no` is only used for error locations.
pub fn decode_line(line: &str, line_no: usize) -> Result<(String, Vec<Detection>), DecodeError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let fail = |kind| {
        let err = DecodeError::at_line(line_no, kind);
        match tokens.first() {
            Some(image) if *image != MARKER => err.with_image(*image),
            _ => err,
        }
    };

    let marker = tokens
        .iter()
        .position(|t| *t == MARKER)
        .ok_or_else(|| fail(DecodeErrorKind::MissingMarker))?;
    let &[image, count] = &tokens[..marker] else {
        return Err(fail(DecodeErrorKind::MalformedHeader));
    };
    let count: usize = count
        .parse()
        .map_err(|_| fail(DecodeErrorKind::InvalidCount(count.to_string())))?;

    let payload = &tokens[marker + 1..];
    let expected = count.checked_mul(RECORD_TOKENS);
    if expected != Some(payload.len()) {
        return Err(fail(DecodeErrorKind::TokenCount {
            count,
            expected: expected.unwrap_or(usize::MAX),
            found: payload.len(),
        }));
    }

    let detections = payload
        .chunks_exact(RECORD_TOKENS)
        .map(decode_record)
        .collect::<Result<Vec<_>, _>>()
        .map_err(fail)?;
    Ok((image.to_string(), detections))
}

fn decode_record(tokens: &[&str]) -> Result<Detection, DecodeErrorKind> {
    let score = parse_finite(tokens[0], "score")?;
    let mut coords = [0i32; 4];
    for (slot, token) in coords.iter_mut().zip(&tokens[1..5]) {
        *slot = parse_token(token, "box coordinate")?;
    }
    let landmarks = tokens[5..]
        .iter()
        .map(|t| parse_finite(t, "landmark"))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Detection::new(
        BBox::from_array(coords),
        score,
        Landmarks::new(landmarks),
    ))
}

/// `f64::from_str` also accepts `NaN` and `inf`, which neither format can carry.
fn parse_finite(token: &str, field: &'static str) -> Result<f64, DecodeErrorKind> {
    let value: f64 = parse_token(token, field)?;
    if !value.is_finite() {
        return Err(DecodeErrorKind::NonNumeric {
            field,
            token: token.to_string(),
        });
    }
    Ok(value)
}

fn parse_token<T: std::str::FromStr>(token: &str, field: &'static str) -> Result<T, DecodeErrorKind> {
    token.parse().map_err(|_| DecodeErrorKind::NonNumeric {
        field,
        token: token.to_string(),
    })
}

/// Encode one image. Detections are written in their current order; missing
/// landmark data is written as ten `-1` slots.
pub fn encode_line(image: &str, detections: &[Detection]) -> Result<String, EncodeError> {
    if image.is_empty() || image.chars().any(char::is_whitespace) {
        return Err(EncodeError::UnrepresentableKey(image.to_string()));
    }

    let mut tokens = Vec::with_capacity(3 + detections.len() * RECORD_TOKENS);
    tokens.push(image.to_string());
    tokens.push(detections.len().to_string());
    tokens.push(MARKER.to_string());

    for detection in detections {
        if !detection.is_finite() {
            return Err(EncodeError::NonFinite(image.to_string()));
        }
        let landmarks = detection.landmarks.to_output();
        if landmarks.len() != LANDMARK_SLOTS {
            return Err(EncodeError::LandmarkSlots {
                image: image.to_string(),
                expected: LANDMARK_SLOTS,
                found: landmarks.len(),
            });
        }
        tokens.push(detection.score.to_string());
        tokens.extend(detection.bbox.to_array().iter().map(i32::to_string));
        tokens.extend(landmarks.iter().map(f64::to_string));
    }

    Ok(tokens.join(" "))
}

/// Encode a whole set, one line per image, without a trailing newline.
pub fn encode(set: &ImageDetectionSet) -> Result<String, EncodeError> {
    let lines = set
        .iter()
        .map(|(image, detections)| encode_line(image, detections))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}
