//! Byte cursor used by the hand-written output grammars.
//!
//! Each grammar rule drives a `Scanner` and either produces a value or a
//! `Miss` recording how far it got. Callers try rules in order and report the
//! miss that advanced furthest.

/// A rule that did not match, and where it stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Miss {
    pub position: usize,
    pub reason: String,
}

impl Miss {
    pub fn new(position: usize, reason: impl Into<String>) -> Self {
        Self {
            position,
            reason: reason.into(),
        }
    }

    /// Keep whichever miss got further into the input.
    pub fn furthest(self, other: Miss) -> Miss {
        if other.position > self.position {
            other
        } else {
            self
        }
    }
}

pub(crate) type RuleResult<T> = Result<T, Miss>;

#[derive(Debug, Clone)]
pub(crate) struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn miss(&self, reason: impl Into<String>) -> Miss {
        Miss::new(self.pos, reason)
    }

    pub fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    /// Consume `literal` if the input continues with it.
    pub fn eat(&mut self, literal: &str) -> bool {
        if self.rest().starts_with(literal) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, literal: &str) -> RuleResult<()> {
        if self.eat(literal) {
            Ok(())
        } else {
            Err(self.miss(format!("expected {literal:?}")))
        }
    }

    /// Advance to just past the next occurrence of `needle`.
    pub fn seek_past(&mut self, needle: &str) -> RuleResult<()> {
        match self.rest().find(needle) {
            Some(offset) => {
                self.pos += offset + needle.len();
                Ok(())
            }
            None => Err(self.miss(format!("{needle:?} not found"))),
        }
    }

    /// Consume a run of ASCII digits as an unsigned integer.
    pub fn number(&mut self) -> RuleResult<u64> {
        let digits = self
            .rest()
            .bytes()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits == 0 {
            return Err(self.miss("expected a number"));
        }
        let text = &self.rest()[..digits];
        let value = text
            .parse::<u64>()
            .map_err(|e| self.miss(format!("number {text:?} out of range: {e}")))?;
        self.pos += digits;
        Ok(value)
    }

    /// Input consumed since `start`.
    pub fn since(&self, start: usize) -> &'a str {
        &self.input[start..self.pos]
    }

    /// Consume characters until one of `stops` (or end of input) and return them.
    pub fn take_until(&mut self, stops: &[&str]) -> &'a str {
        let rest = self.rest();
        let end = stops
            .iter()
            .filter_map(|stop| rest.find(stop))
            .min()
            .unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seek_and_number() {
        let mut scanner = Scanner::new("abc (tool-12.3)");
        scanner.seek_past("(tool-").unwrap();
        assert_eq!(scanner.number().unwrap(), 12);
        assert!(scanner.eat("."));
        assert_eq!(scanner.number().unwrap(), 3);
        assert_eq!(scanner.rest(), ")");
    }

    #[test]
    fn test_number_miss_keeps_position() {
        let mut scanner = Scanner::new("v.x");
        assert!(scanner.eat("v."));
        let miss = scanner.number().unwrap_err();
        assert_eq!(miss.position, 2);
        assert_eq!(scanner.position(), 2);
    }

    #[test]
    fn test_take_until_nearest_stop() {
        let mut scanner = Scanner::new("name:iPhone 15, OS:17.2 }");
        assert!(scanner.eat("name:"));
        assert_eq!(scanner.take_until(&[", ", " }"]), "iPhone 15");
        assert!(scanner.eat(", "));
    }

    #[test]
    fn test_furthest_miss() {
        let a = Miss::new(3, "a");
        let b = Miss::new(7, "b");
        assert_eq!(a.clone().furthest(b.clone()), b);
        assert_eq!(b.clone().furthest(a), b);
    }
}
