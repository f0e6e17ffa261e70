use crate::ChainError;
use crate::layout::{ArrayField, BASE_SIZE, NEXT_OFFSET, VariantLayout, layout_for};
use crate::structs::StructureType;
use bytemuck::Pod;
use vellum_capture::Packet;
use vellum_types::BodyOffset;

/// An array of a decoded node, resolved against the packet body.
#[derive(Debug, Clone)]
pub struct ResolvedArray<'p> {
    pub field: &'static ArrayField,
    pub count: u32,
    pub offset: BodyOffset,
    /// `None` when the stored offset was null.
    pub bytes: Option<&'p [u8]>,
    /// Per element, the arrays listed in [`ArrayField::nested`]; empty when there are none.
    pub nested: Vec<Vec<ResolvedArray<'p>>>,
}

impl<'p> ResolvedArray<'p> {
    pub fn name(&self) -> &'static str {
        self.field.name
    }

    pub fn is_null(&self) -> bool {
        self.bytes.is_none()
    }

    /// The nested array `name` of element `index`.
    pub fn nested_array(&self, index: usize, name: &str) -> Option<&ResolvedArray<'p>> {
        self.nested.get(index)?.iter().find(|a| a.name() == name)
    }

    /// Copies the elements out as `T`; `None` if `T` does not match the element size.
    pub fn elements<T: Pod>(&self) -> Option<Vec<T>> {
        if std::mem::size_of::<T>() != self.field.element_size {
            return None;
        }
        Some(
            self.bytes
                .map(bytemuck::pod_collect_to_vec::<u8, T>)
                .unwrap_or_default(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct DecodedNode<'p> {
    pub s_type: StructureType,
    pub offset: BodyOffset,
    /// `None` for structure types the decoder does not recognize.
    pub layout: Option<&'static VariantLayout>,
    /// The node's copied bytes: the full structure if recognized, the prefix otherwise.
    pub bytes: &'p [u8],
    pub arrays: Vec<ResolvedArray<'p>>,
}

impl<'p> DecodedNode<'p> {
    pub fn is_recognized(&self) -> bool {
        self.layout.is_some()
    }

    pub fn name(&self) -> Option<&'static str> {
        self.layout.map(|l| l.name)
    }

    pub fn array(&self, name: &str) -> Option<&ResolvedArray<'p>> {
        self.arrays.iter().find(|a| a.name() == name)
    }

    /// Reads a `u32` field at `offset` within the node.
    pub fn u32_at(&self, offset: usize) -> Option<u32> {
        let raw = self.bytes.get(offset..offset.checked_add(4)?)?;
        Some(bytemuck::pod_read_unaligned(raw))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DecodedChain<'p> {
    pub nodes: Vec<DecodedNode<'p>>,
    pub unrecognized: Vec<StructureType>,
}

impl<'p> DecodedChain<'p> {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn find(&self, s_type: StructureType) -> Option<&DecodedNode<'p>> {
        self.nodes.iter().find(|n| n.s_type == s_type)
    }
}

fn read_offset(bytes: &[u8], at: usize) -> BodyOffset {
    BodyOffset::from_raw(bytemuck::pod_read_unaligned(&bytes[at..at + 8]))
}

/// Resolves every array described by `fields` against `owner`, the bytes of the structure or
/// element that holds the pointer slots.
fn resolve_arrays<'p>(
    packet: &'p Packet,
    owner: &[u8],
    fields: &'static [ArrayField],
) -> Result<Vec<ResolvedArray<'p>>, ChainError> {
    let mut arrays = Vec::with_capacity(fields.len());
    for field in fields {
        let count: u32 =
            bytemuck::pod_read_unaligned(&owner[field.count_offset..field.count_offset + 4]);
        let offset = read_offset(owner, field.pointer_offset);
        let bytes = if offset.is_null() {
            None
        } else {
            let len = field.byte_len(count);
            Some(
                packet
                    .slice(offset, len)
                    .ok_or(ChainError::OffsetOutOfBounds {
                        offset: offset.get(),
                        len,
                    })?,
            )
        };
        let mut nested = Vec::new();
        if let Some(bytes) = bytes.filter(|_| !field.nested.is_empty()) {
            for element in bytes.chunks_exact(field.element_size) {
                nested.push(resolve_arrays(packet, element, field.nested)?);
            }
        }
        arrays.push(ResolvedArray {
            field,
            count,
            offset,
            bytes,
            nested,
        });
    }
    Ok(arrays)
}

/// Walks the chain whose first node is at `first`, bounds-checking every offset.
///
/// Unknown structure types are logged and listed, and the walk continues through their
/// `p_next` offset. A walk longer than the body could possibly hold is reported as a cycle.
pub fn decode_chain(packet: &Packet, first: BodyOffset) -> Result<DecodedChain<'_>, ChainError> {
    let max_nodes = packet.body().len() / BASE_SIZE;
    let mut chain = DecodedChain::default();
    let mut offset = first;

    while !offset.is_null() {
        let prefix = packet
            .slice(offset, BASE_SIZE as u64)
            .ok_or(ChainError::OffsetOutOfBounds {
                offset: offset.get(),
                len: BASE_SIZE as u64,
            })?;
        if chain.nodes.len() >= max_nodes {
            return Err(ChainError::TooManyNodes { limit: max_nodes });
        }
        let s_type = StructureType(bytemuck::pod_read_unaligned(&prefix[..4]));
        let layout = layout_for(s_type);
        let size = layout.map_or(BASE_SIZE, |l| l.size) as u64;
        let bytes = packet
            .slice(offset, size)
            .ok_or(ChainError::OffsetOutOfBounds {
                offset: offset.get(),
                len: size,
            })?;

        let arrays = match layout {
            Some(layout) => resolve_arrays(packet, bytes, layout.arrays)?,
            None => {
                tracing::error!(%s_type, offset = offset.get(), "unrecognized extension structure in chain");
                chain.unrecognized.push(s_type);
                Vec::new()
            }
        };

        let next = read_offset(bytes, NEXT_OFFSET);
        chain.nodes.push(DecodedNode {
            s_type,
            offset,
            layout,
            bytes,
            arrays,
        });
        offset = next;
    }

    Ok(chain)
}

/// Decodes the chain hanging off the pointer slot at `slot` (relative to body start).
pub fn decode_chain_at(packet: &Packet, slot: usize) -> Result<DecodedChain<'_>, ChainError> {
    let first = packet
        .read_offset_at(slot)
        .ok_or(ChainError::OffsetOutOfBounds {
            offset: slot as u64,
            len: 8,
        })?;
    decode_chain(packet, first)
}
