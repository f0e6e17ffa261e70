//! Declarative description of every recognized extension structure: its total size and the
//! `(pointer, count, element size)` triples of its array fields.
//!
//! Elements that themselves hold pointers list those arrays in [`ArrayField::nested`], with
//! offsets relative to the start of each element.
//!
//! Both the capture walker and the replay decoder drive off this one table.

use crate::structs::*;
use std::mem::{offset_of, size_of};

/// Size of the `{ s_type, p_next }` prefix every chain node carries.
pub const BASE_SIZE: usize = size_of::<BaseInStructure>();

/// Offset of the `p_next` slot within any chain node.
pub const NEXT_OFFSET: usize = offset_of!(BaseInStructure, p_next);

/// One array hanging off a structure: a pointer slot plus the `u32` count that sizes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayField {
    pub name: &'static str,
    pub pointer_offset: usize,
    pub count_offset: usize,
    pub element_size: usize,
    /// Arrays carried by every element of this one.
    pub nested: &'static [ArrayField],
}

impl ArrayField {
    /// Byte length of the array for `count` elements.
    pub fn byte_len(&self, count: u32) -> u64 {
        self.element_size as u64 * count as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantLayout {
    pub s_type: StructureType,
    pub name: &'static str,
    pub size: usize,
    pub arrays: &'static [ArrayField],
}

/// `p_sample_locations` of the info embedded in each attachment element.
const ATTACHMENT_SAMPLE_LOCATIONS: &[ArrayField] = &[ArrayField {
    name: "p_sample_locations",
    pointer_offset: offset_of!(AttachmentSampleLocationsEXT, sample_locations_info.p_sample_locations),
    count_offset: offset_of!(
        AttachmentSampleLocationsEXT,
        sample_locations_info.sample_locations_count
    ),
    element_size: size_of::<SampleLocationEXT>(),
    nested: &[],
}];

const SUBPASS_SAMPLE_LOCATIONS: &[ArrayField] = &[ArrayField {
    name: "p_sample_locations",
    pointer_offset: offset_of!(SubpassSampleLocationsEXT, sample_locations_info.p_sample_locations),
    count_offset: offset_of!(SubpassSampleLocationsEXT, sample_locations_info.sample_locations_count),
    element_size: size_of::<SampleLocationEXT>(),
    nested: &[],
}];

const IMMUTABLE_SAMPLERS: &[ArrayField] = &[ArrayField {
    name: "p_immutable_samplers",
    pointer_offset: offset_of!(DescriptorSetLayoutBinding, p_immutable_samplers),
    count_offset: offset_of!(DescriptorSetLayoutBinding, descriptor_count),
    element_size: size_of::<Handle>(),
    nested: &[],
}];

macro_rules! nested_arrays {
    () => {
        &[]
    };
    ($nested:ident) => {
        $nested
    };
}

macro_rules! variant_layouts {
    ($(
        $owner:ident => [
            $( $ptr:ident : [$elem:ty; $count:ident] $(with $nested:ident)? ),* $(,)?
        ]
    ),* $(,)?) => {
        /// Every extension structure the chain walker can copy and restore.
        pub static VARIANT_LAYOUTS: &[VariantLayout] = &[
            $(
                VariantLayout {
                    s_type: <$owner as Extension>::STRUCTURE_TYPE,
                    name: stringify!($owner),
                    size: size_of::<$owner>(),
                    arrays: &[
                        $(
                            ArrayField {
                                name: stringify!($ptr),
                                pointer_offset: offset_of!($owner, $ptr),
                                count_offset: offset_of!($owner, $count),
                                element_size: size_of::<$elem>(),
                                nested: nested_arrays!($($nested)?),
                            },
                        )*
                    ],
                },
            )*
        ];
    };
}

variant_layouts! {
    DescriptorSetLayoutCreateInfo => [
        p_bindings: [DescriptorSetLayoutBinding; binding_count] with IMMUTABLE_SAMPLERS,
    ],
    DeviceGroupDeviceCreateInfo => [
        p_physical_devices: [Handle; physical_device_count],
    ],
    DeviceGroupRenderPassBeginInfo => [
        p_device_render_areas: [Rect2D; device_render_area_count],
    ],
    DeviceGroupCommandBufferBeginInfo => [],
    DeviceGroupSubmitInfo => [
        p_wait_semaphore_device_indices: [u32; wait_semaphore_count],
        p_command_buffer_device_masks: [u32; command_buffer_count],
        p_signal_semaphore_device_indices: [u32; signal_semaphore_count],
    ],
    DeviceGroupBindSparseInfo => [],
    DeviceGroupSwapchainCreateInfo => [],
    BindBufferMemoryDeviceGroupInfo => [
        p_device_indices: [u32; device_index_count],
    ],
    BindImageMemoryDeviceGroupInfo => [
        p_device_indices: [u32; device_index_count],
        p_split_instance_bind_regions: [Rect2D; split_instance_bind_region_count],
    ],
    ValidationFlagsEXT => [
        p_disabled_validation_checks: [u32; disabled_validation_check_count],
    ],
    IndirectCommandsLayoutCreateInfoNVX => [
        p_tokens: [IndirectCommandsLayoutTokenNVX; token_count],
    ],
    CmdProcessCommandsInfoNVX => [
        p_indirect_commands_tokens: [IndirectCommandsTokenNVX; indirect_commands_token_count],
    ],
    PipelineViewportWScalingStateCreateInfoNV => [
        p_viewport_w_scalings: [ViewportWScalingNV; viewport_count],
    ],
    PresentTimesInfoGOOGLE => [
        p_times: [PresentTimeGOOGLE; swapchain_count],
    ],
    PipelineViewportSwizzleStateCreateInfoNV => [
        p_viewport_swizzles: [ViewportSwizzleNV; viewport_count],
    ],
    PipelineDiscardRectangleStateCreateInfoEXT => [
        p_discard_rectangles: [Rect2D; discard_rectangle_count],
    ],
    SampleLocationsInfoEXT => [
        p_sample_locations: [SampleLocationEXT; sample_locations_count],
    ],
    RenderPassSampleLocationsBeginInfoEXT => [
        p_attachment_initial_sample_locations: [
            AttachmentSampleLocationsEXT;
            attachment_initial_sample_locations_count
        ] with ATTACHMENT_SAMPLE_LOCATIONS,
        p_post_subpass_sample_locations: [
            SubpassSampleLocationsEXT;
            post_subpass_sample_locations_count
        ] with SUBPASS_SAMPLE_LOCATIONS,
    ],
    ImageFormatListCreateInfo => [
        p_view_formats: [u32; view_format_count],
    ],
    PipelineCoverageModulationStateCreateInfoNV => [
        p_coverage_modulation_table: [f32; coverage_modulation_table_count],
    ],
    RenderPassMultiviewCreateInfo => [
        p_view_masks: [u32; subpass_count],
        p_view_offsets: [i32; dependency_count],
        p_correlation_masks: [u32; correlation_mask_count],
    ],
    Win32KeyedMutexAcquireReleaseInfoKHR => [
        p_acquire_syncs: [Handle; acquire_count],
        p_acquire_keys: [u64; acquire_count],
        p_acquire_timeouts: [u32; acquire_count],
        p_release_syncs: [Handle; release_count],
        p_release_keys: [u64; release_count],
    ],
    Win32KeyedMutexAcquireReleaseInfoNV => [
        p_acquire_syncs: [Handle; acquire_count],
        p_acquire_keys: [u64; acquire_count],
        p_acquire_timeout_milliseconds: [u32; acquire_count],
        p_release_syncs: [Handle; release_count],
        p_release_keys: [u64; release_count],
    ],
}

/// Looks up the layout for a structure type; `None` for anything unrecognized.
pub fn layout_for(s_type: StructureType) -> Option<&'static VariantLayout> {
    VARIANT_LAYOUTS.iter().find(|layout| layout.s_type == s_type)
}
