//! Task-data staging: raw byte buffers in, owned typed containers out.
//!
//! A [`TaskData`] is the opaque container handed to every task. It carries
//! ordered input buffers with a parallel list of element counts, and output
//! buffers with their counts. Counts may outnumber buffers: extra entries
//! encode scalar metadata such as matrix dimensions.
//!
//! Tasks never reinterpret the bytes in place. A [`BufferSchema`] names the
//! element type and count of a buffer, and [`TaskData::stage`] decodes it once
//! into a `Vec<T>` at the pre-processing boundary.

use bytemuck::Pod;
use thiserror::Error;

/// Element types that can travel through a [`TaskData`] buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    F64,
    F32,
    I64,
    I32,
    U32,
}

/// A plain-old-data type with a known [`ElementType`].
pub trait Element: Pod + Send + Sync + 'static {
    const TYPE: ElementType;
    const SIZE: usize = std::mem::size_of::<Self>();
}

macro_rules! impl_element {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(impl Element for $ty {
            const TYPE: ElementType = ElementType::$tag;
        })*

        impl ElementType {
            /// Size of one element in bytes.
            pub fn size(self) -> usize {
                match self {
                    $(ElementType::$tag => <$ty as Element>::SIZE,)*
                }
            }
        }
    };
}

impl_element!(f64 => F64, f32 => F32, i64 => I64, i32 => I32, u32 => U32);

/// Layout of one buffer: element type and element count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSchema {
    pub element: ElementType,
    pub count: usize,
}

impl BufferSchema {
    pub fn of<T: Element>(count: usize) -> Self {
        Self {
            element: T::TYPE,
            count,
        }
    }

    /// Bytes needed to hold `count` elements.
    pub fn byte_len(&self) -> Result<usize, StagingError> {
        self.count
            .checked_mul(self.element.size())
            .ok_or(StagingError::Oversized {
                element: self.element,
                count: self.count,
            })
    }
}

/// Errors raised while staging buffers.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("Input buffer {0} is missing")]
    MissingInput(usize),

    #[error("Input count {0} is missing")]
    MissingCount(usize),

    #[error("Output buffer {0} is missing")]
    MissingOutput(usize),

    #[error("Buffer {index} holds {available} bytes but its schema needs {needed}")]
    TooShort {
        index: usize,
        available: usize,
        needed: usize,
    },

    #[error("{count} {element:?} elements overflow the address space")]
    Oversized { element: ElementType, count: usize },

    #[error("Schema describes {schema:?} elements but {requested:?} were requested")]
    ElementMismatch {
        schema: ElementType,
        requested: ElementType,
    },
}

/// Raw buffers and counts exchanged between a task and its caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskData {
    pub inputs: Vec<Vec<u8>>,
    pub inputs_count: Vec<usize>,
    pub outputs: Vec<Vec<u8>>,
    pub outputs_count: Vec<usize>,
}

impl TaskData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an input buffer holding `values`, with its element count.
    pub fn with_input<T: Element>(mut self, values: &[T]) -> Self {
        self.inputs.push(bytemuck::cast_slice(values).to_vec());
        self.inputs_count.push(values.len());
        self
    }

    /// Append a bare count entry with no buffer behind it.
    pub fn with_count(mut self, count: usize) -> Self {
        self.inputs_count.push(count);
        self
    }

    /// Append a zeroed output buffer for `count` elements of `T`.
    ///
    /// A count whose byte length overflows gets an empty buffer; reading it
    /// back fails instead of allocating.
    pub fn with_output<T: Element>(mut self, count: usize) -> Self {
        let len = BufferSchema::of::<T>(count).byte_len().unwrap_or(0);
        self.outputs.push(vec![0; len]);
        self.outputs_count.push(count);
        self
    }

    pub fn input_count(&self, index: usize) -> Result<usize, StagingError> {
        self.inputs_count
            .get(index)
            .copied()
            .ok_or(StagingError::MissingCount(index))
    }

    pub fn output_count(&self, index: usize) -> Result<usize, StagingError> {
        self.outputs_count
            .get(index)
            .copied()
            .ok_or(StagingError::MissingOutput(index))
    }

    /// Decode input buffer `index` into an owned vector according to `schema`.
    pub fn stage<T: Element>(&self, index: usize, schema: BufferSchema) -> Result<Vec<T>, StagingError> {
        if schema.element != T::TYPE {
            return Err(StagingError::ElementMismatch {
                schema: schema.element,
                requested: T::TYPE,
            });
        }
        let bytes = self
            .inputs
            .get(index)
            .ok_or(StagingError::MissingInput(index))?;
        let needed = schema.byte_len()?;
        if bytes.len() < needed {
            return Err(StagingError::TooShort {
                index,
                available: bytes.len(),
                needed,
            });
        }
        // Buffers carry no alignment guarantee, so copy rather than cast.
        Ok(bytemuck::pod_collect_to_vec(&bytes[..needed]))
    }

    /// Decode input buffer `index` using its own count entry.
    pub fn stage_counted<T: Element>(&self, index: usize) -> Result<Vec<T>, StagingError> {
        let count = self.input_count(index)?;
        self.stage(index, BufferSchema::of::<T>(count))
    }

    /// Replace output buffer `index` with `values` and update its count.
    pub fn write_output<T: Element>(&mut self, index: usize, values: &[T]) -> Result<(), StagingError> {
        let slot = self
            .outputs
            .get_mut(index)
            .ok_or(StagingError::MissingOutput(index))?;
        *slot = bytemuck::cast_slice(values).to_vec();
        match self.outputs_count.get_mut(index) {
            Some(count) => *count = values.len(),
            None => return Err(StagingError::MissingOutput(index)),
        }
        Ok(())
    }

    /// Decode output buffer `index` into an owned vector.
    pub fn read_output<T: Element>(&self, index: usize) -> Result<Vec<T>, StagingError> {
        let count = self.output_count(index)?;
        let bytes = self
            .outputs
            .get(index)
            .ok_or(StagingError::MissingOutput(index))?;
        let needed = BufferSchema::of::<T>(count).byte_len()?;
        if bytes.len() < needed {
            return Err(StagingError::TooShort {
                index,
                available: bytes.len(),
                needed,
            });
        }
        Ok(bytemuck::pod_collect_to_vec(&bytes[..needed]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_f64_buffer() {
        let data = TaskData::new().with_input(&[1.5_f64, -2.0, 3.25]);
        let staged: Vec<f64> = data.stage_counted(0).unwrap();
        assert_eq!(staged, vec![1.5, -2.0, 3.25]);
        assert_eq!(data.inputs[0].len(), 24);
    }

    #[test]
    fn test_stage_prefix_only() {
        let data = TaskData::new().with_input(&[1_i32, 2, 3, 4]);
        let staged: Vec<i32> = data.stage(0, BufferSchema::of::<i32>(2)).unwrap();
        assert_eq!(staged, vec![1, 2]);
    }

    #[test]
    fn test_stage_rejects_short_buffer() {
        let data = TaskData::new().with_input(&[1.0_f64]);
        let err = data.stage::<f64>(0, BufferSchema::of::<f64>(2)).unwrap_err();
        assert!(matches!(
            err,
            StagingError::TooShort {
                index: 0,
                available: 8,
                needed: 16
            }
        ));
    }

    #[test]
    fn test_stage_rejects_type_mismatch() {
        let data = TaskData::new().with_input(&[1_u32]);
        let err = data.stage::<f64>(0, BufferSchema::of::<u32>(1)).unwrap_err();
        assert!(matches!(err, StagingError::ElementMismatch { .. }));
    }

    #[test]
    fn test_missing_buffers() {
        let data = TaskData::new().with_count(3);
        assert_eq!(data.input_count(0).unwrap(), 3);
        assert!(matches!(
            data.stage_counted::<f64>(0),
            Err(StagingError::MissingInput(0))
        ));
        assert!(matches!(data.input_count(1), Err(StagingError::MissingCount(1))));
        assert!(matches!(data.output_count(0), Err(StagingError::MissingOutput(0))));
    }

    #[test]
    fn test_element_sizes_match_types() {
        assert_eq!(ElementType::F64.size(), 8);
        assert_eq!(ElementType::I32.size(), std::mem::size_of::<i32>());
        assert_eq!(<u32 as Element>::SIZE, 4);
    }

    #[test]
    fn test_huge_counts_do_not_overflow() {
        let schema = BufferSchema::of::<f64>(usize::MAX);
        assert!(matches!(
            schema.byte_len(),
            Err(StagingError::Oversized { count: usize::MAX, .. })
        ));

        let data = TaskData::new().with_input(&[1.0_f64]).with_output::<f64>(usize::MAX);
        assert!(data.outputs[0].is_empty());
        assert!(matches!(data.stage::<f64>(0, schema), Err(StagingError::Oversized { .. })));
        assert!(matches!(data.read_output::<f64>(0), Err(StagingError::Oversized { .. })));
    }

    #[test]
    fn test_output_round_trip() {
        let mut data = TaskData::new().with_output::<f64>(2);
        assert_eq!(data.read_output::<f64>(0).unwrap(), vec![0.0, 0.0]);
        data.write_output(0, &[4.0_f64, 1.0]).unwrap();
        assert_eq!(data.read_output::<f64>(0).unwrap(), vec![4.0, 1.0]);
        assert!(data.write_output(1, &[0.0_f64]).is_err());
    }
}
