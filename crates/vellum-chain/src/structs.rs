//! `#[repr(C)]` mirrors of the extension structures the walker understands.
//!
//! Each structure begins with the common `{ s_type, p_next }` base. Array fields are a raw
//! pointer paired with a `u32` element count held elsewhere in the same structure.

use bytemuck::{Pod, Zeroable};
use std::ffi::c_void;
use std::fmt;

/// Discriminant stored in the first field of every extension structure.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable)]
pub struct StructureType(pub u32);

impl StructureType {
    pub const DESCRIPTOR_SET_LAYOUT_CREATE_INFO: Self = Self(32);
    pub const RENDER_PASS_MULTIVIEW_CREATE_INFO: Self = Self(1_000_053_000);
    pub const WIN32_KEYED_MUTEX_ACQUIRE_RELEASE_INFO_NV: Self = Self(1_000_058_000);
    pub const DEVICE_GROUP_RENDER_PASS_BEGIN_INFO: Self = Self(1_000_060_003);
    pub const DEVICE_GROUP_COMMAND_BUFFER_BEGIN_INFO: Self = Self(1_000_060_004);
    pub const DEVICE_GROUP_SUBMIT_INFO: Self = Self(1_000_060_005);
    pub const DEVICE_GROUP_BIND_SPARSE_INFO: Self = Self(1_000_060_006);
    pub const DEVICE_GROUP_SWAPCHAIN_CREATE_INFO: Self = Self(1_000_060_012);
    pub const BIND_BUFFER_MEMORY_DEVICE_GROUP_INFO: Self = Self(1_000_060_013);
    pub const BIND_IMAGE_MEMORY_DEVICE_GROUP_INFO: Self = Self(1_000_060_014);
    pub const VALIDATION_FLAGS_EXT: Self = Self(1_000_061_000);
    pub const DEVICE_GROUP_DEVICE_CREATE_INFO: Self = Self(1_000_070_001);
    pub const WIN32_KEYED_MUTEX_ACQUIRE_RELEASE_INFO_KHR: Self = Self(1_000_075_000);
    pub const INDIRECT_COMMANDS_LAYOUT_CREATE_INFO_NVX: Self = Self(1_000_086_001);
    pub const CMD_PROCESS_COMMANDS_INFO_NVX: Self = Self(1_000_086_002);
    pub const PIPELINE_VIEWPORT_W_SCALING_STATE_CREATE_INFO_NV: Self = Self(1_000_087_000);
    pub const PRESENT_TIMES_INFO_GOOGLE: Self = Self(1_000_092_000);
    pub const PIPELINE_VIEWPORT_SWIZZLE_STATE_CREATE_INFO_NV: Self = Self(1_000_098_000);
    pub const PIPELINE_DISCARD_RECTANGLE_STATE_CREATE_INFO_EXT: Self = Self(1_000_099_001);
    pub const SAMPLE_LOCATIONS_INFO_EXT: Self = Self(1_000_143_000);
    pub const RENDER_PASS_SAMPLE_LOCATIONS_BEGIN_INFO_EXT: Self = Self(1_000_143_001);
    pub const IMAGE_FORMAT_LIST_CREATE_INFO: Self = Self(1_000_147_000);
    pub const PIPELINE_COVERAGE_MODULATION_STATE_CREATE_INFO_NV: Self = Self(1_000_152_000);
}

impl fmt::Debug for StructureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StructureType({})", self.0)
    }
}

impl fmt::Display for StructureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Implemented by every structure with a fixed [`StructureType`].
pub trait Extension {
    const STRUCTURE_TYPE: StructureType;
}

/// The prefix shared by every structure in a chain.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BaseInStructure {
    pub s_type: StructureType,
    pub p_next: *const BaseInStructure,
}

/// Opaque driver object handle.
pub type Handle = u64;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Offset2D {
    pub x: i32,
    pub y: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Rect2D {
    pub offset: Offset2D,
    pub extent: Extent2D,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct ViewportWScalingNV {
    pub xcoeff: f32,
    pub ycoeff: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct ViewportSwizzleNV {
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub w: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct SampleLocationEXT {
    pub x: f32,
    pub y: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct IndirectCommandsLayoutTokenNVX {
    pub token_type: u32,
    pub binding_unit: u32,
    pub dynamic_count: u32,
    pub divisor: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct IndirectCommandsTokenNVX {
    pub token_type: u32,
    pub _pad: u32,
    pub buffer: Handle,
    pub offset: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct PresentTimeGOOGLE {
    pub present_id: u32,
    pub _pad: u32,
    pub desired_present_time: u64,
}

/// Element of [`DescriptorSetLayoutCreateInfo::p_bindings`]; carries its own sampler array.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DescriptorSetLayoutBinding {
    pub binding: u32,
    pub descriptor_type: u32,
    pub descriptor_count: u32,
    pub stage_flags: u32,
    pub p_immutable_samplers: *const Handle,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AttachmentSampleLocationsEXT {
    pub attachment_index: u32,
    pub sample_locations_info: SampleLocationsInfoEXT,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SubpassSampleLocationsEXT {
    pub subpass_index: u32,
    pub sample_locations_info: SampleLocationsInfoEXT,
}

macro_rules! extension_structs {
    ($(
        $(#[$meta:meta])*
        $name:ident = $s_type:ident {
            $( $field:ident : $ty:ty ),* $(,)?
        }
    )*) => {
        $(
            $(#[$meta])*
            #[repr(C)]
            #[derive(Debug, Clone, Copy)]
            pub struct $name {
                pub s_type: StructureType,
                pub p_next: *const c_void,
                $( pub $field: $ty, )*
            }

            impl Extension for $name {
                const STRUCTURE_TYPE: StructureType = StructureType::$s_type;
            }
        )*
    };
}

extension_structs! {
    DescriptorSetLayoutCreateInfo = DESCRIPTOR_SET_LAYOUT_CREATE_INFO {
        flags: u32,
        binding_count: u32,
        p_bindings: *const DescriptorSetLayoutBinding,
    }

    DeviceGroupDeviceCreateInfo = DEVICE_GROUP_DEVICE_CREATE_INFO {
        physical_device_count: u32,
        p_physical_devices: *const Handle,
    }

    DeviceGroupRenderPassBeginInfo = DEVICE_GROUP_RENDER_PASS_BEGIN_INFO {
        device_mask: u32,
        device_render_area_count: u32,
        p_device_render_areas: *const Rect2D,
    }

    DeviceGroupCommandBufferBeginInfo = DEVICE_GROUP_COMMAND_BUFFER_BEGIN_INFO {
        device_mask: u32,
    }

    DeviceGroupSubmitInfo = DEVICE_GROUP_SUBMIT_INFO {
        wait_semaphore_count: u32,
        p_wait_semaphore_device_indices: *const u32,
        command_buffer_count: u32,
        p_command_buffer_device_masks: *const u32,
        signal_semaphore_count: u32,
        p_signal_semaphore_device_indices: *const u32,
    }

    DeviceGroupBindSparseInfo = DEVICE_GROUP_BIND_SPARSE_INFO {
        resource_device_index: u32,
        memory_device_index: u32,
    }

    DeviceGroupSwapchainCreateInfo = DEVICE_GROUP_SWAPCHAIN_CREATE_INFO {
        modes: u32,
    }

    BindBufferMemoryDeviceGroupInfo = BIND_BUFFER_MEMORY_DEVICE_GROUP_INFO {
        device_index_count: u32,
        p_device_indices: *const u32,
    }

    BindImageMemoryDeviceGroupInfo = BIND_IMAGE_MEMORY_DEVICE_GROUP_INFO {
        device_index_count: u32,
        p_device_indices: *const u32,
        split_instance_bind_region_count: u32,
        p_split_instance_bind_regions: *const Rect2D,
    }

    ValidationFlagsEXT = VALIDATION_FLAGS_EXT {
        disabled_validation_check_count: u32,
        p_disabled_validation_checks: *const u32,
    }

    IndirectCommandsLayoutCreateInfoNVX = INDIRECT_COMMANDS_LAYOUT_CREATE_INFO_NVX {
        pipeline_bind_point: u32,
        flags: u32,
        token_count: u32,
        p_tokens: *const IndirectCommandsLayoutTokenNVX,
    }

    CmdProcessCommandsInfoNVX = CMD_PROCESS_COMMANDS_INFO_NVX {
        object_table: Handle,
        indirect_commands_layout: Handle,
        indirect_commands_token_count: u32,
        p_indirect_commands_tokens: *const IndirectCommandsTokenNVX,
        max_sequences_count: u32,
        target_command_buffer: Handle,
        sequences_count_buffer: Handle,
        sequences_count_offset: u64,
        sequences_index_buffer: Handle,
        sequences_index_offset: u64,
    }

    PipelineViewportWScalingStateCreateInfoNV = PIPELINE_VIEWPORT_W_SCALING_STATE_CREATE_INFO_NV {
        viewport_w_scaling_enable: u32,
        viewport_count: u32,
        p_viewport_w_scalings: *const ViewportWScalingNV,
    }

    PresentTimesInfoGOOGLE = PRESENT_TIMES_INFO_GOOGLE {
        swapchain_count: u32,
        p_times: *const PresentTimeGOOGLE,
    }

    PipelineViewportSwizzleStateCreateInfoNV = PIPELINE_VIEWPORT_SWIZZLE_STATE_CREATE_INFO_NV {
        flags: u32,
        viewport_count: u32,
        p_viewport_swizzles: *const ViewportSwizzleNV,
    }

    PipelineDiscardRectangleStateCreateInfoEXT = PIPELINE_DISCARD_RECTANGLE_STATE_CREATE_INFO_EXT {
        flags: u32,
        discard_rectangle_mode: u32,
        discard_rectangle_count: u32,
        p_discard_rectangles: *const Rect2D,
    }

    SampleLocationsInfoEXT = SAMPLE_LOCATIONS_INFO_EXT {
        sample_locations_per_pixel: u32,
        sample_location_grid_size: Extent2D,
        sample_locations_count: u32,
        p_sample_locations: *const SampleLocationEXT,
    }

    RenderPassSampleLocationsBeginInfoEXT = RENDER_PASS_SAMPLE_LOCATIONS_BEGIN_INFO_EXT {
        attachment_initial_sample_locations_count: u32,
        p_attachment_initial_sample_locations: *const AttachmentSampleLocationsEXT,
        post_subpass_sample_locations_count: u32,
        p_post_subpass_sample_locations: *const SubpassSampleLocationsEXT,
    }

    ImageFormatListCreateInfo = IMAGE_FORMAT_LIST_CREATE_INFO {
        view_format_count: u32,
        p_view_formats: *const u32,
    }

    PipelineCoverageModulationStateCreateInfoNV = PIPELINE_COVERAGE_MODULATION_STATE_CREATE_INFO_NV {
        flags: u32,
        coverage_modulation_mode: u32,
        coverage_modulation_table_enable: u32,
        coverage_modulation_table_count: u32,
        p_coverage_modulation_table: *const f32,
    }

    RenderPassMultiviewCreateInfo = RENDER_PASS_MULTIVIEW_CREATE_INFO {
        subpass_count: u32,
        p_view_masks: *const u32,
        dependency_count: u32,
        p_view_offsets: *const i32,
        correlation_mask_count: u32,
        p_correlation_masks: *const u32,
    }

    /// Acquire and release arrays share their counts.
    Win32KeyedMutexAcquireReleaseInfoKHR = WIN32_KEYED_MUTEX_ACQUIRE_RELEASE_INFO_KHR {
        acquire_count: u32,
        p_acquire_syncs: *const Handle,
        p_acquire_keys: *const u64,
        p_acquire_timeouts: *const u32,
        release_count: u32,
        p_release_syncs: *const Handle,
        p_release_keys: *const u64,
    }

    Win32KeyedMutexAcquireReleaseInfoNV = WIN32_KEYED_MUTEX_ACQUIRE_RELEASE_INFO_NV {
        acquire_count: u32,
        p_acquire_syncs: *const Handle,
        p_acquire_keys: *const u64,
        p_acquire_timeout_milliseconds: *const u32,
        release_count: u32,
        p_release_syncs: *const Handle,
        p_release_keys: *const u64,
    }
}
