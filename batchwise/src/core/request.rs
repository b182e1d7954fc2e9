//! Batch requests and batch slices.

use super::options::BatchRequestOptions;
use super::partitioner::Partitioner;
use super::sorter::Sorter;
use crate::error::{BatchError, Result};
use std::fmt;
use std::str::FromStr;

/// A declarative description of which batches to produce from one asset.
///
/// With a partitioner and empty options the request is a template that
/// expands to every discovered partition. `Null` option values are
/// wildcards.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub datasource_name: String,
    pub data_asset_name: String,
    pub options: BatchRequestOptions,
    pub partitioner: Option<Partitioner>,
    pub batch_slice: Option<BatchSlice>,
    /// Overrides the asset's `order_by` when non-empty.
    pub sorters: Vec<Sorter>,
}

impl BatchRequest {
    /// An unpartitioned request for the whole asset.
    pub fn new(datasource_name: impl Into<String>, data_asset_name: impl Into<String>) -> Self {
        Self {
            datasource_name: datasource_name.into(),
            data_asset_name: data_asset_name.into(),
            options: BatchRequestOptions::new(),
            partitioner: None,
            batch_slice: None,
            sorters: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: BatchRequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_partitioner(mut self, partitioner: Partitioner) -> Self {
        self.partitioner = Some(partitioner);
        self
    }

    pub fn with_batch_slice(mut self, batch_slice: BatchSlice) -> Self {
        self.batch_slice = Some(batch_slice);
        self
    }

    pub fn with_sorters(mut self, sorters: Vec<Sorter>) -> Self {
        self.sorters = sorters;
        self
    }

    /// Returns a copy of this request with different options.
    pub(crate) fn with_concrete_options(&self, options: BatchRequestOptions) -> Self {
        Self {
            datasource_name: self.datasource_name.clone(),
            data_asset_name: self.data_asset_name.clone(),
            options,
            partitioner: self.partitioner.clone(),
            batch_slice: None,
            sorters: Vec::new(),
        }
    }
}

/// A python-style `start:stop:step` range applied to the sorted batch list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSlice {
    pub start: Option<isize>,
    pub stop: Option<isize>,
    pub step: Option<isize>,
}

impl BatchSlice {
    pub fn new(start: Option<isize>, stop: Option<isize>, step: Option<isize>) -> Result<Self> {
        if step == Some(0) {
            return Err(BatchError::Configuration(
                "batch slice step cannot be zero".to_string(),
            ));
        }
        Ok(Self { start, stop, step })
    }

    /// A single index: `-1` selects the last element, `i` selects `i:i+1`.
    ///
    /// `isize::MAX` is past the end of any sequence and selects nothing.
    pub fn index(i: isize) -> Self {
        let stop = if i == -1 { None } else { Some(i.saturating_add(1)) };
        Self {
            start: Some(i),
            stop,
            step: None,
        }
    }

    /// Indices selected from a sequence of length `len`, in order.
    ///
    /// Follows python slice semantics; out-of-range bounds are clamped, so
    /// the result may be empty but never fails.
    pub fn indices(&self, len: usize) -> Vec<usize> {
        let len = len as isize;
        let step = self.step.unwrap_or(1);

        let clamp = |bound: isize, lower: isize, upper: isize| -> isize {
            let b = if bound < 0 { bound + len } else { bound };
            b.clamp(lower, upper)
        };

        let mut out = Vec::new();
        if step > 0 {
            let start = self.start.map_or(0, |s| clamp(s, 0, len));
            let stop = self.stop.map_or(len, |s| clamp(s, 0, len));
            let mut i = start;
            while i < stop {
                out.push(i as usize);
                match i.checked_add(step) {
                    Some(next) => i = next,
                    None => break,
                }
            }
        } else {
            let start = self.start.map_or(len - 1, |s| clamp(s, -1, len - 1));
            let stop = self.stop.map_or(-1, |s| clamp(s, -1, len - 1));
            let mut i = start;
            while i > stop {
                out.push(i as usize);
                match i.checked_add(step) {
                    Some(next) => i = next,
                    None => break,
                }
            }
        }
        out
    }

    /// Applies the slice to a vector, consuming it.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let wanted = self.indices(items.len());
        let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
        wanted.into_iter().filter_map(|i| slots[i].take()).collect()
    }
}

impl FromStr for BatchSlice {
    type Err = BatchError;

    /// Parses `"[1:3]"`, `"-2:"`, `"::2"` or a bare index such as `"-1"`.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let inner = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(trimmed)
            .trim();

        let parse_bound = |part: &str| -> Result<Option<isize>> {
            let part = part.trim();
            if part.is_empty() || part == "None" {
                return Ok(None);
            }
            part.parse::<isize>().map(Some).map_err(|_| {
                BatchError::Configuration(format!("Invalid batch slice '{s}': '{part}' is not an integer"))
            })
        };

        let parts: Vec<&str> = inner.split(':').collect();
        match parts.as_slice() {
            [index] => match parse_bound(index)? {
                Some(i) => Ok(Self::index(i)),
                None => Ok(Self::default()),
            },
            [start, stop] => Self::new(parse_bound(start)?, parse_bound(stop)?, None),
            [start, stop, step] => {
                Self::new(parse_bound(start)?, parse_bound(stop)?, parse_bound(step)?)
            }
            _ => Err(BatchError::Configuration(format!(
                "Invalid batch slice '{s}': expected at most three ':'-separated parts"
            ))),
        }
    }
}

impl fmt::Display for BatchSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |b: Option<isize>| b.map(|v| v.to_string()).unwrap_or_default();
        write!(f, "[{}:{}", show(self.start), show(self.stop))?;
        if let Some(step) = self.step {
            write!(f, ":{step}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slices() {
        assert_eq!(
            "[-1:]".parse::<BatchSlice>().unwrap(),
            BatchSlice::new(Some(-1), None, None).unwrap()
        );
        assert_eq!(
            "1:3".parse::<BatchSlice>().unwrap(),
            BatchSlice::new(Some(1), Some(3), None).unwrap()
        );
        assert_eq!(
            "[::2]".parse::<BatchSlice>().unwrap(),
            BatchSlice::new(None, None, Some(2)).unwrap()
        );
        assert_eq!("-1".parse::<BatchSlice>().unwrap(), BatchSlice::index(-1));
        assert_eq!("2".parse::<BatchSlice>().unwrap(), BatchSlice::index(2));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("[a:b]".parse::<BatchSlice>().is_err());
        assert!("1:2:3:4".parse::<BatchSlice>().is_err());
        assert!("::0".parse::<BatchSlice>().is_err());
    }

    #[test]
    fn test_last_element() {
        let slice: BatchSlice = "[-1:]".parse().unwrap();
        assert_eq!(slice.apply(vec![1, 2, 3]), vec![3]);
        assert!(slice.apply(Vec::<i32>::new()).is_empty());
    }

    #[test]
    fn test_out_of_range_is_empty() {
        let slice: BatchSlice = "[5:10]".parse().unwrap();
        assert!(slice.apply(vec![1, 2, 3]).is_empty());
    }

    #[test]
    fn test_index_slice() {
        assert_eq!(BatchSlice::index(1).apply(vec!['a', 'b', 'c']), vec!['b']);
        assert_eq!(BatchSlice::index(-2).apply(vec!['a', 'b', 'c']), vec!['b']);
    }

    #[test]
    fn test_negative_step() {
        let slice: BatchSlice = "[::-1]".parse().unwrap();
        assert_eq!(slice.apply(vec![1, 2, 3]), vec![3, 2, 1]);
        let slice: BatchSlice = "[2:0:-1]".parse().unwrap();
        assert_eq!(slice.apply(vec![1, 2, 3]), vec![3, 2]);
    }

    #[test]
    fn test_extreme_bounds_do_not_overflow() {
        let slice: BatchSlice = isize::MAX.to_string().parse().unwrap();
        assert!(slice.apply(vec![1, 2, 3]).is_empty());

        let slice: BatchSlice = format!("[1::{}]", isize::MAX).parse().unwrap();
        assert_eq!(slice.apply(vec![1, 2, 3]), vec![2]);

        let slice: BatchSlice = format!("[::{}]", isize::MIN).parse().unwrap();
        assert_eq!(slice.apply(vec![1, 2, 3]), vec![3]);

        let slice: BatchSlice = format!("[{}:{}]", isize::MIN, isize::MAX).parse().unwrap();
        assert_eq!(slice.apply(vec![1, 2, 3]), vec![1, 2, 3]);
    }

    #[test]
    fn test_display() {
        assert_eq!(BatchSlice::new(Some(-5), None, None).unwrap().to_string(), "[-5:]");
        assert_eq!(
            BatchSlice::new(Some(0), Some(4), Some(2)).unwrap().to_string(),
            "[0:4:2]"
        );
    }
}
