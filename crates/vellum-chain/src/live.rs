use crate::decode::{DecodedChain, ResolvedArray};
use crate::layout::NEXT_OFFSET;
use crate::structs::BaseInStructure;

/// A decoded chain rebuilt as live structures whose pointers are real addresses again.
///
/// Trailing buffers in a packet are only 4-aligned, so nodes and arrays are both copied into
/// owned 8-aligned storage before any pointer is handed out.
pub struct LiveChain {
    nodes: Vec<Vec<u64>>,
    arrays: Vec<Vec<u64>>,
}

fn aligned_copy(bytes: &[u8]) -> Vec<u64> {
    let mut words = vec![0u64; bytes.len().div_ceil(8)];
    bytemuck::cast_slice_mut::<u64, u8>(&mut words)[..bytes.len()].copy_from_slice(bytes);
    words
}

fn store_pointer(words: &mut [u64], offset: usize, pointer: *const u8) {
    let slot = &mut bytemuck::cast_slice_mut::<u64, u8>(words)[offset..offset + 8];
    unsafe { std::ptr::write_unaligned(slot.as_mut_ptr().cast::<*const u8>(), pointer) };
}

/// Copies `array` into owned storage, after patching the nested pointers of each element.
fn materialize_array(array: &ResolvedArray<'_>, arrays: &mut Vec<Vec<u64>>) -> *const u8 {
    let Some(bytes) = array.bytes else {
        return std::ptr::null();
    };
    let mut storage = aligned_copy(bytes);
    for (index, element) in array.nested.iter().enumerate() {
        let base = index * array.field.element_size;
        for inner in element {
            let pointer = materialize_array(inner, arrays);
            store_pointer(&mut storage, base + inner.field.pointer_offset, pointer);
        }
    }
    let pointer = storage.as_ptr().cast::<u8>();
    arrays.push(storage);
    pointer
}

impl LiveChain {
    pub fn materialize(chain: &DecodedChain<'_>) -> Self {
        let mut arrays = Vec::new();
        let mut nodes: Vec<Vec<u64>> = Vec::with_capacity(chain.nodes.len());

        for node in &chain.nodes {
            let mut words = aligned_copy(node.bytes);
            for array in &node.arrays {
                let pointer = materialize_array(array, &mut arrays);
                store_pointer(&mut words, array.field.pointer_offset, pointer);
            }
            nodes.push(words);
        }

        // Linked back to front so no node is written after its address has been taken.
        let mut next: *const u8 = std::ptr::null();
        for words in nodes.iter_mut().rev() {
            store_pointer(words, NEXT_OFFSET, next);
            next = words.as_ptr().cast();
        }

        Self { nodes, arrays }
    }

    /// First node of the chain, or null if it is empty.
    pub fn head(&self) -> *const BaseInStructure {
        self.nodes
            .first()
            .map_or(std::ptr::null(), |n| n.as_ptr().cast())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl std::fmt::Debug for LiveChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveChain")
            .field("nodes", &self.nodes.len())
            .field("arrays", &self.arrays.len())
            .finish()
    }
}
