//! Reply grammar shared by all command families.
//!
//! A reply frame looks like `AT<body>\r\r\n<keyword> <fields>\r\n\r\nOK\r\n`.
//! Every parser checks, in order: the echo of the line we sent, the final
//! status line, the reply keyword after the echo, and then the fields.
//! Numbers are parsed strictly: an empty or non-numeric digit run is an
//! error, never zero.

use no_std_net::Ipv4Addr;

use crate::error::Error;

/// Final status line of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Terminator {
    Ok,
    Error,
}

const STATUS_LINES: [(&[u8], Terminator); 4] = [
    (b"\r\nOK\r\n", Terminator::Ok),
    (b"\r\nERROR\r\n", Terminator::Error),
    (b"OK\r\n", Terminator::Ok),
    (b"ERROR\r\n", Terminator::Error),
];

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// One reply frame together with the echo of the command that caused it.
#[derive(Debug, Clone, Copy)]
pub struct Reply<'a> {
    raw: &'a [u8],
    echo: &'a [u8],
}

impl<'a> Reply<'a> {
    /// `echo` is the command line as sent, `AT<body>` without line ending.
    pub fn new(raw: &'a [u8], echo: &'a [u8]) -> Self {
        Self { raw, echo }
    }

    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    pub fn has_echo(&self) -> bool {
        find(self.raw, self.echo).is_some()
    }

    fn echo_end(&self) -> Result<usize, Error> {
        find(self.raw, self.echo)
            .map(|pos| pos + self.echo.len())
            .ok_or(Error::NoEcho)
    }

    /// Start of the final status line and its kind.
    fn status_line(&self) -> Option<(usize, Terminator)> {
        STATUS_LINES.iter().find_map(|(line, kind)| {
            self.raw
                .ends_with(line)
                .then(|| (self.raw.len() - line.len(), *kind))
        })
    }

    pub fn terminator(&self) -> Option<Terminator> {
        self.status_line().map(|(_, kind)| kind)
    }

    /// Check the echo and the status line, then return everything between
    /// them.
    pub fn content(&self) -> Result<&'a [u8], Error> {
        let start = self.echo_end()?;
        let end = match self.status_line() {
            Some((end, Terminator::Ok)) => end,
            Some((_, Terminator::Error)) => return Err(Error::ModemError),
            None => return Err(Error::Incomplete),
        };
        self.raw.get(start..end).ok_or(Error::Incomplete)
    }

    /// Echo plus `OK`, for commands without reply fields.
    pub fn ok(&self) -> Result<(), Error> {
        self.content().map(|_| ())
    }

    /// Position a cursor right after the reply keyword.
    pub fn keyword(&self, keyword: &[u8]) -> Result<Cursor<'a>, Error> {
        let content = self.content()?;
        let pos = find(content, keyword).ok_or(Error::NoReply)?;
        Ok(Cursor::new(&content[pos + keyword.len()..]))
    }

    /// Like [`Reply::keyword`], but the cursor runs to the end of the frame,
    /// status line included. Used for replies carrying a length prefixed
    /// payload that may itself contain delimiters.
    pub fn keyword_raw(&self, keyword: &[u8]) -> Result<Cursor<'a>, Error> {
        let start = self.echo_end()?;
        match self.terminator() {
            Some(Terminator::Ok) => {}
            Some(Terminator::Error) => return Err(Error::ModemError),
            None => return Err(Error::Incomplete),
        }
        let after_echo = &self.raw[start..];
        let pos = find(after_echo, keyword).ok_or(Error::NoReply)?;
        Ok(Cursor::new(&after_echo[pos + keyword.len()..]))
    }
}

/// Delimiter driven field scanner.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    rest: &'a [u8],
}

impl<'a> Cursor<'a> {
    pub fn new(rest: &'a [u8]) -> Self {
        Self { rest }
    }

    pub fn rest(&self) -> &'a [u8] {
        self.rest
    }

    fn skip_spaces(&mut self) {
        while let [b' ', tail @ ..] = self.rest {
            self.rest = tail;
        }
    }

    /// Parse a decimal digit run, after optional leading spaces.
    pub fn number<T: TryFrom<u32>>(&mut self) -> Result<T, Error> {
        self.skip_spaces();
        let digits = self
            .rest
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits == 0 {
            return Err(Error::MalformedField);
        }

        let mut value: u32 = 0;
        for &d in &self.rest[..digits] {
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u32::from(d - b'0')))
                .ok_or(Error::MalformedField)?;
        }
        self.rest = &self.rest[digits..];
        T::try_from(value).map_err(|_| Error::MalformedField)
    }

    /// Consume exactly `delim`.
    pub fn expect(&mut self, delim: u8) -> Result<(), Error> {
        match self.rest {
            [b, tail @ ..] if *b == delim => {
                self.rest = tail;
                Ok(())
            }
            _ => Err(Error::MalformedField),
        }
    }

    /// Everything up to `delim`, which is consumed but not returned.
    pub fn until(&mut self, delim: &[u8]) -> Result<&'a [u8], Error> {
        let pos = find(self.rest, delim).ok_or(Error::MalformedField)?;
        let field = &self.rest[..pos];
        self.rest = &self.rest[pos + delim.len()..];
        Ok(field)
    }

    /// Skip past the first occurrence of `marker`.
    pub fn skip_past(&mut self, marker: &[u8]) -> Result<(), Error> {
        self.until(marker).map(|_| ())
    }

    /// Exactly `len` bytes.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], Error> {
        if self.rest.len() < len {
            return Err(Error::Incomplete);
        }
        let (field, tail) = self.rest.split_at(len);
        self.rest = tail;
        Ok(field)
    }

    /// Dotted quad, every octet within `0..=255`.
    pub fn ipv4(&mut self) -> Result<Ipv4Addr, Error> {
        let a = self.number()?;
        self.expect(b'.')?;
        let b = self.number()?;
        self.expect(b'.')?;
        let c = self.number()?;
        self.expect(b'.')?;
        let d = self.number()?;
        Ok(Ipv4Addr::new(a, b, c, d))
    }
}
