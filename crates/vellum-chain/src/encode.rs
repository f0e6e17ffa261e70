use crate::ChainError;
use crate::layout::{ArrayField, BASE_SIZE, NEXT_OFFSET, VariantLayout, layout_for};
use crate::structs::{BaseInStructure, StructureType};
use std::ptr;
use vellum_capture::Packet;
use vellum_types::{BodyOffset, round_up_4};

/// What [`append_chain`] copied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainReport {
    /// Body offset of the first copied node, null for an empty chain.
    pub first: BodyOffset,
    pub nodes: usize,
    /// Structure types that had no layout and were copied as a bare prefix.
    pub unrecognized: Vec<StructureType>,
}

unsafe fn read_field<T: Copy>(node: *const u8, offset: usize) -> T {
    unsafe { ptr::read_unaligned(node.add(offset).cast::<T>()) }
}

unsafe fn node_bytes<'a>(node: *const BaseInStructure, layout: Option<&VariantLayout>) -> &'a [u8] {
    let size = layout.map_or(BASE_SIZE, |l| l.size);
    unsafe { std::slice::from_raw_parts(node.cast::<u8>(), size) }
}

/// Trailing bytes for the arrays hanging off the structure or element at `base`.
unsafe fn arrays_size(base: *const u8, fields: &[ArrayField]) -> u64 {
    let mut total = 0u64;
    for field in fields {
        let pointer: *const u8 = unsafe { read_field(base, field.pointer_offset) };
        let count: u32 = unsafe { read_field(base, field.count_offset) };
        if pointer.is_null() {
            continue;
        }
        total += round_up_4(field.byte_len(count));
        if !field.nested.is_empty() {
            for i in 0..count as usize {
                let element = unsafe { pointer.add(i * field.element_size) };
                total += unsafe { arrays_size(element, field.nested) };
            }
        }
    }
    total
}

/// Copies every array of the structure or element at `original` and rewrites the matching
/// pointer slots of its copy, which starts `copy_base` bytes into the body.
unsafe fn relocate_arrays(
    packet: &mut Packet,
    s_type: StructureType,
    original: *const u8,
    copy_base: usize,
    fields: &[ArrayField],
) -> Result<(), ChainError> {
    for field in fields {
        let pointer: *const u8 = unsafe { read_field(original, field.pointer_offset) };
        let count: u32 = unsafe { read_field(original, field.count_offset) };
        let relocated = if pointer.is_null() {
            BodyOffset::NULL
        } else {
            let len = usize::try_from(field.byte_len(count))
                .map_err(|_| ChainError::ArrayTooLarge { s_type, count })?;
            let elements = unsafe { std::slice::from_raw_parts(pointer, len) };
            let copy = packet.append_trailing(elements)?;
            if !field.nested.is_empty() && !copy.is_null() {
                for i in 0..count as usize {
                    let at = i * field.element_size;
                    unsafe {
                        relocate_arrays(
                            packet,
                            s_type,
                            pointer.add(at),
                            copy.get() as usize + at,
                            field.nested,
                        )
                    }?;
                }
            }
            copy
        };
        packet.write_offset_at(copy_base + field.pointer_offset, relocated)?;
    }
    Ok(())
}

/// Trailing bytes needed to copy the chain starting at `first`, including every array.
///
/// # Safety
///
/// `first` must be null or point to a well-formed chain: every node starts with a
/// [`BaseInStructure`], recognized nodes are complete structures of their type, and every
/// non-null array pointer, nested ones included, is valid for `count` elements.
pub unsafe fn chain_size(first: *const BaseInStructure) -> u64 {
    let mut total = 0u64;
    let mut node = first;
    while !node.is_null() {
        let s_type = unsafe { (*node).s_type };
        match layout_for(s_type) {
            Some(layout) => {
                total += round_up_4(layout.size as u64);
                total += unsafe { arrays_size(node.cast(), layout.arrays) };
            }
            None => total += round_up_4(BASE_SIZE as u64),
        }
        node = unsafe { (*node).p_next };
    }
    total
}

/// Copies the chain starting at `first` into `packet`'s trailing region.
///
/// Each node is copied whole, each of its arrays is copied right after it (followed by any
/// arrays its elements carry), and every pointer in the copy is rewritten to a body offset. Nodes of unknown type keep
/// only their `{ s_type, p_next }` prefix; they are logged and listed in the report.
///
/// # Safety
///
/// Same contract as [`chain_size`]. The packet must have been allocated with at least
/// `chain_size(first)` bytes of spare capacity.
pub unsafe fn append_chain(
    packet: &mut Packet,
    first: *const BaseInStructure,
) -> Result<ChainReport, ChainError> {
    let mut report = ChainReport::default();
    let mut previous_next_slot: Option<usize> = None;
    let mut node = first;

    while !node.is_null() {
        let s_type = unsafe { (*node).s_type };
        let layout = layout_for(s_type);
        let copy = packet.append_trailing(unsafe { node_bytes(node, layout) })?;
        let copy_base = copy.get() as usize;

        match layout {
            Some(layout) => {
                unsafe { relocate_arrays(packet, s_type, node.cast(), copy_base, layout.arrays) }?;
            }
            None => {
                tracing::error!(%s_type, "unrecognized extension structure; copying prefix only");
                report.unrecognized.push(s_type);
            }
        }

        packet.write_offset_at(copy_base + NEXT_OFFSET, BodyOffset::NULL)?;
        match previous_next_slot {
            Some(slot) => packet.write_offset_at(slot, copy)?,
            None => report.first = copy,
        }
        previous_next_slot = Some(copy_base + NEXT_OFFSET);
        report.nodes += 1;
        node = unsafe { (*node).p_next };
    }

    tracing::trace!(nodes = report.nodes, "copied extension chain");
    Ok(report)
}

/// Copies the chain and stores its first offset into the pointer slot at `slot` (relative to
/// body start), typically the `p_next` field of the root structure in the inline payload.
///
/// # Safety
///
/// Same contract as [`append_chain`].
pub unsafe fn append_chain_at(
    packet: &mut Packet,
    slot: usize,
    first: *const BaseInStructure,
) -> Result<ChainReport, ChainError> {
    let report = unsafe { append_chain(packet, first) }?;
    packet.write_offset_at(slot, report.first)?;
    Ok(report)
}
