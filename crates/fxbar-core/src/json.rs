//! Element-at-a-time JSON array codec.
//!
//! Cached day files store bars as a plain JSON array. The writer streams one
//! element at a time; the reader scans object boundaries (string and escape
//! aware) and deserializes each `{...}` group individually so a day of bars
//! never has to be parsed as one document.

use crate::errors::StreamError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;

/// Write the items as a JSON array: `[`, comma-separated elements, `]`.
pub fn write_json_array<'a, T, I, W>(items: I, out: &mut W) -> Result<(), StreamError>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
    W: Write,
{
    out.write_all(b"[")?;
    let mut first = true;
    for item in items {
        if !first {
            out.write_all(b",")?;
        }
        serde_json::to_writer(&mut *out, item)?;
        first = false;
    }
    out.write_all(b"]")?;
    Ok(())
}

/// Serialize the items to a JSON array held in memory.
pub fn to_json_array<'a, T, I>(items: I) -> Result<Vec<u8>, StreamError>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut buffer = Vec::new();
    write_json_array(items, &mut buffer)?;
    Ok(buffer)
}

/// Streaming reader over a JSON array of objects.
///
/// Yields one deserialized element per `{...}` group. Whitespace and the
/// separating commas are skipped; a closing `]` (or end of input) terminates
/// the stream. The optional visitor runs on each decoded element before it is
/// emitted.
pub struct JsonArrayStream<T> {
    data: Vec<u8>,
    position: usize,
    started: bool,
    done: bool,
    visitor: Option<Box<dyn FnMut(&T)>>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: DeserializeOwned> JsonArrayStream<T> {
    pub fn new(data: Vec<u8>) -> Self {
        Self::with_visitor(data, None)
    }

    pub fn with_visitor(data: Vec<u8>, visitor: Option<Box<dyn FnMut(&T)>>) -> Self {
        JsonArrayStream {
            data,
            position: 0,
            started: false,
            done: false,
            visitor,
            _marker: std::marker::PhantomData,
        }
    }

    /// Decode the whole array into a list.
    pub fn read_all(self) -> Result<Vec<T>, StreamError> {
        self.collect()
    }

    fn skip_whitespace(&mut self) {
        while let Some(byte) = self.data.get(self.position) {
            if byte.is_ascii_whitespace() {
                self.position += 1;
            } else {
                break;
            }
        }
    }

    /// Advance past the current `{...}` object and return its byte range.
    fn next_object_range(&mut self) -> Result<Option<(usize, usize)>, StreamError> {
        self.skip_whitespace();
        if !self.started {
            match self.data.get(self.position) {
                Some(b'[') => {
                    self.started = true;
                    self.position += 1;
                    self.skip_whitespace();
                }
                _ => {
                    return Err(StreamError::state(
                        "JSON array payload must start with '['",
                    ))
                }
            }
        }
        while let Some(byte) = self.data.get(self.position) {
            match byte {
                b',' | b' ' | b'\t' | b'\r' | b'\n' => self.position += 1,
                b']' => {
                    self.position = self.data.len();
                    return Ok(None);
                }
                b'{' => return self.scan_object(),
                other => {
                    return Err(StreamError::state(format!(
                        "unexpected byte {:#x} in JSON array at offset {}",
                        other, self.position
                    )))
                }
            }
        }
        Ok(None)
    }

    fn scan_object(&mut self) -> Result<Option<(usize, usize)>, StreamError> {
        let start = self.position;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        while let Some(byte) = self.data.get(self.position) {
            self.position += 1;
            if in_string {
                if escaped {
                    escaped = false;
                } else if *byte == b'\\' {
                    escaped = true;
                } else if *byte == b'"' {
                    in_string = false;
                }
                continue;
            }
            match byte {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(Some((start, self.position)));
                    }
                }
                _ => {}
            }
        }
        Err(StreamError::state("unterminated object in JSON array"))
    }
}

impl<T: DeserializeOwned> Iterator for JsonArrayStream<T> {
    type Item = Result<T, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_object_range() {
            Err(error) => {
                self.done = true;
                Some(Err(error))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Ok(Some((start, end))) => {
                match serde_json::from_slice::<T>(&self.data[start..end]) {
                    Ok(item) => {
                        if let Some(visit) = self.visitor.as_deref_mut() {
                            visit(&item);
                        }
                        Some(Ok(item))
                    }
                    Err(error) => {
                        self.done = true;
                        Some(Err(error.into()))
                    }
                }
            }
        }
    }
}
