//! Command-buffer diagrams: records which commands each command buffer received and renders a
//! submission as a Graphviz `digraph`, one record node per command buffer.

use facet::Facet;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

macro_rules! command_kinds {
    ($($variant:ident => $name:literal,)*) => {
        /// A recorded command type.
        #[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        #[facet(rename_all = "snake_case")]
        pub enum CommandKind {
            $($variant,)*
        }

        impl CommandKind {
            /// Every kind, indexed by its raw value.
            pub const ALL: &'static [CommandKind] = &[$(CommandKind::$variant,)*];

            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }
        }
    };
}

command_kinds! {
    None => "CMD_NONE",
    BeginCommandBuffer => "CMD_BEGINCOMMANDBUFFER",
    BeginDebugUtilsLabelExt => "CMD_BEGINDEBUGUTILSLABELEXT",
    BeginQuery => "CMD_BEGINQUERY",
    BeginRenderPass => "CMD_BEGINRENDERPASS",
    BindDescriptorSets => "CMD_BINDDESCRIPTORSETS",
    BindIndexBuffer => "CMD_BINDINDEXBUFFER",
    BindPipeline => "CMD_BINDPIPELINE",
    BindVertexBuffers => "CMD_BINDVERTEXBUFFERS",
    BlitImage => "CMD_BLITIMAGE",
    ClearAttachments => "CMD_CLEARATTACHMENTS",
    ClearColorImage => "CMD_CLEARCOLORIMAGE",
    ClearDepthStencilImage => "CMD_CLEARDEPTHSTENCILIMAGE",
    CopyBuffer => "CMD_COPYBUFFER",
    CopyBufferToImage => "CMD_COPYBUFFERTOIMAGE",
    CopyImage => "CMD_COPYIMAGE",
    CopyImageToBuffer => "CMD_COPYIMAGETOBUFFER",
    CopyQueryPoolResults => "CMD_COPYQUERYPOOLRESULTS",
    DebugMarkerBeginExt => "CMD_DEBUGMARKERBEGINEXT",
    DebugMarkerEndExt => "CMD_DEBUGMARKERENDEXT",
    DebugMarkerInsertExt => "CMD_DEBUGMARKERINSERTEXT",
    Dispatch => "CMD_DISPATCH",
    DispatchBase => "CMD_DISPATCHBASE",
    DispatchBaseKhr => "CMD_DISPATCHBASEKHR",
    DispatchIndirect => "CMD_DISPATCHINDIRECT",
    Draw => "CMD_DRAW",
    DrawIndexed => "CMD_DRAWINDEXED",
    DrawIndexedIndirect => "CMD_DRAWINDEXEDINDIRECT",
    DrawIndexedIndirectCountAmd => "CMD_DRAWINDEXEDINDIRECTCOUNTAMD",
    DrawIndirect => "CMD_DRAWINDIRECT",
    DrawIndirectCountAmd => "CMD_DRAWINDIRECTCOUNTAMD",
    EndCommandBuffer => "CMD_ENDCOMMANDBUFFER",
    EndDebugUtilsLabelExt => "CMD_ENDDEBUGUTILSLABELEXT",
    EndQuery => "CMD_ENDQUERY",
    EndRenderPass => "CMD_ENDRENDERPASS",
    ExecuteCommands => "CMD_EXECUTECOMMANDS",
    FillBuffer => "CMD_FILLBUFFER",
    InsertDebugUtilsLabelExt => "CMD_INSERTDEBUGUTILSLABELEXT",
    NextSubpass => "CMD_NEXTSUBPASS",
    PipelineBarrier => "CMD_PIPELINEBARRIER",
    ProcessCommandsNvx => "CMD_PROCESSCOMMANDSNVX",
    PushConstants => "CMD_PUSHCONSTANTS",
    PushDescriptorSetKhr => "CMD_PUSHDESCRIPTORSETKHR",
    PushDescriptorSetWithTemplateKhr => "CMD_PUSHDESCRIPTORSETWITHTEMPLATEKHR",
    ReserveSpaceForCommandsNvx => "CMD_RESERVESPACEFORCOMMANDSNVX",
    ResetEvent => "CMD_RESETEVENT",
    ResetQueryPool => "CMD_RESETQUERYPOOL",
    ResolveImage => "CMD_RESOLVEIMAGE",
    SetBlendConstants => "CMD_SETBLENDCONSTANTS",
    SetDepthBias => "CMD_SETDEPTHBIAS",
    SetDepthBounds => "CMD_SETDEPTHBOUNDS",
    SetDeviceMask => "CMD_SETDEVICEMASK",
    SetDeviceMaskKhr => "CMD_SETDEVICEMASKKHR",
    SetDiscardRectangleExt => "CMD_SETDISCARDRECTANGLEEXT",
    SetEvent => "CMD_SETEVENT",
    SetLineWidth => "CMD_SETLINEWIDTH",
    SetSampleLocationsExt => "CMD_SETSAMPLELOCATIONSEXT",
    SetScissor => "CMD_SETSCISSOR",
    SetStencilCompareMask => "CMD_SETSTENCILCOMPAREMASK",
    SetStencilReference => "CMD_SETSTENCILREFERENCE",
    SetStencilWriteMask => "CMD_SETSTENCILWRITEMASK",
    SetViewport => "CMD_SETVIEWPORT",
    SetViewportWScalingNv => "CMD_SETVIEWPORTWSCALINGNV",
    UpdateBuffer => "CMD_UPDATEBUFFER",
    WaitEvents => "CMD_WAITEVENTS",
    WriteBufferMarkerAmd => "CMD_WRITEBUFFERMARKERAMD",
    WriteTimestamp => "CMD_WRITETIMESTAMP",
}

pub const UNKNOWN_COMMAND_NAME: &str = "CMD_UNKNOWN";

impl CommandKind {
    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    /// Display name for a raw command value, `CMD_UNKNOWN` when out of range.
    pub fn name_of_raw(raw: u32) -> &'static str {
        Self::from_raw(raw).map_or(UNKNOWN_COMMAND_NAME, Self::name)
    }
}

/// The commands recorded into one command buffer, in order.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct CommandBufferRecord {
    pub handle: u64,
    pub commands: Vec<CommandKind>,
}

/// Renders one record node per command buffer, in the order given.
pub fn render_command_buffers(records: &[CommandBufferRecord]) -> String {
    let mut out = String::from("digraph G {\n  node [shape=record];\n");
    for (i, record) in records.iter().enumerate() {
        let _ = write!(
            out,
            "  node{i} [label = \"{{<n> COMMAND BUFFER 0x{:x}",
            record.handle
        );
        for command in &record.commands {
            let _ = write!(out, " | {}", command.name());
        }
        out.push_str("}\"];\n");
    }
    out.push_str("}\n");
    out
}

/// A rendered submission and the file name it should be stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagram {
    pub file_name: String,
    pub dot: String,
}

impl Diagram {
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.dot)?;
        Ok(path)
    }
}

/// Accumulates commands per command buffer and renders each queue submission.
#[derive(Debug)]
pub struct CommandRecorder {
    base_name: String,
    buffers: HashMap<u64, Vec<CommandKind>>,
    submissions: u32,
}

impl Default for CommandRecorder {
    fn default() -> Self {
        Self::new("vellum_cmds")
    }
}

impl CommandRecorder {
    pub fn new(base_name: impl Into<String>) -> Self {
        Self {
            base_name: base_name.into(),
            buffers: HashMap::new(),
            submissions: 0,
        }
    }

    /// Appends `kind` to the command buffer's list. Beginning a command buffer discards what
    /// it held before, since it is being re-recorded.
    pub fn record(&mut self, command_buffer: u64, kind: CommandKind) {
        let commands = self.buffers.entry(command_buffer).or_default();
        if kind == CommandKind::BeginCommandBuffer {
            commands.clear();
        }
        commands.push(kind);
    }

    pub fn commands(&self, command_buffer: u64) -> &[CommandKind] {
        self.buffers
            .get(&command_buffer)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Forgets a freed command buffer.
    pub fn forget(&mut self, command_buffer: u64) {
        self.buffers.remove(&command_buffer);
    }

    /// Renders the command buffers of one submission; each call gets the next file number.
    pub fn submit(&mut self, command_buffers: &[u64]) -> Diagram {
        let records: Vec<CommandBufferRecord> = command_buffers
            .iter()
            .map(|handle| CommandBufferRecord {
                handle: *handle,
                commands: self.commands(*handle).to_vec(),
            })
            .collect();
        let file_name = format!("{}{}.dot", self.base_name, self.submissions);
        self.submissions += 1;
        tracing::debug!(file_name, buffers = records.len(), "rendered submission diagram");
        Diagram {
            file_name,
            dot: render_command_buffers(&records),
        }
    }
}
