/// Image layout tracking
///
/// Every texture has a resting layout it returns to after each pass or
/// transfer. The tracker records the current layout of every (mip, layer)
/// of every image and turns a layout request over a sub-resource range into
/// the minimal list of transitions, merged into rectangular runs.

use ash::vk;
use rustc_hash::FxHashMap;

/// Sub-resource rectangle of one image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LayoutRange {
    pub base_mip: u32,
    pub mip_count: u32,
    pub base_layer: u32,
    pub layer_count: u32,
}

impl LayoutRange {
    pub fn new(base_mip: u32, mip_count: u32, base_layer: u32, layer_count: u32) -> Self {
        Self { base_mip, mip_count, base_layer, layer_count }
    }

    pub fn mip(mip: u32, layer: u32) -> Self {
        Self::new(mip, 1, layer, 1)
    }
}

/// Layout change the caller must record as an image barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LayoutTransition {
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub range: LayoutRange,
}

#[derive(Debug)]
struct ImageLayouts {
    mips: u32,
    layers: u32,
    /// Layer-major: index = layer * mips + mip
    layouts: Vec<vk::ImageLayout>,
}

impl ImageLayouts {
    fn index(&self, mip: u32, layer: u32) -> usize {
        (layer * self.mips + mip) as usize
    }
}

#[derive(Debug, Default)]
pub(crate) struct LayoutTracker {
    images: FxHashMap<vk::Image, ImageLayouts>,
}

impl LayoutTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking an image whose sub-resources are all in `layout`
    pub fn register(&mut self, image: vk::Image, mips: u32, layers: u32, layout: vk::ImageLayout) {
        self.images.insert(
            image,
            ImageLayouts { mips, layers, layouts: vec![layout; (mips * layers) as usize] },
        );
    }

    pub fn forget(&mut self, image: vk::Image) {
        self.images.remove(&image);
    }

    pub fn is_tracked(&self, image: vk::Image) -> bool {
        self.images.contains_key(&image)
    }

    /// Current layout of one sub-resource
    pub fn layout(&self, image: vk::Image, mip: u32, layer: u32) -> Option<vk::ImageLayout> {
        let image = self.images.get(&image)?;
        if mip >= image.mips || layer >= image.layers {
            return None;
        }
        Some(image.layouts[image.index(mip, layer)])
    }

    /// Move `range` of `image` to `new_layout`, returning the transitions needed
    ///
    /// Sub-resources already in `new_layout` produce nothing. Untracked images
    /// and out-of-range sub-resources are ignored.
    pub fn transition(
        &mut self,
        image: vk::Image,
        range: LayoutRange,
        new_layout: vk::ImageLayout,
    ) -> Vec<LayoutTransition> {
        let Some(state) = self.images.get_mut(&image) else {
            return Vec::new();
        };
        let mip_end = (range.base_mip + range.mip_count).min(state.mips);
        let layer_end = (range.base_layer + range.layer_count).min(state.layers);

        // Runs of consecutive mips sharing an old layout, per layer
        let mut runs: Vec<LayoutTransition> = Vec::new();
        for layer in range.base_layer..layer_end {
            let mut mip = range.base_mip;
            while mip < mip_end {
                let old_layout = state.layouts[state.index(mip, layer)];
                let start = mip;
                while mip < mip_end && state.layouts[state.index(mip, layer)] == old_layout {
                    let index = state.index(mip, layer);
                    state.layouts[index] = new_layout;
                    mip += 1;
                }
                if old_layout != new_layout {
                    runs.push(LayoutTransition {
                        old_layout,
                        new_layout,
                        range: LayoutRange::new(start, mip - start, layer, 1),
                    });
                }
            }
        }

        // Merge identical mip runs of consecutive layers
        let mut merged: Vec<LayoutTransition> = Vec::with_capacity(runs.len());
        for run in runs {
            let extend = merged.iter_mut().rev().find(|m| {
                m.old_layout == run.old_layout
                    && m.range.base_mip == run.range.base_mip
                    && m.range.mip_count == run.range.mip_count
                    && m.range.base_layer + m.range.layer_count == run.range.base_layer
            });
            match extend {
                Some(m) => m.range.layer_count += 1,
                None => merged.push(run),
            }
        }
        merged
    }
}

/// Access mask and pipeline stage that go with a layout in a barrier
pub(crate) fn layout_access(layout: vk::ImageLayout) -> (vk::AccessFlags, vk::PipelineStageFlags) {
    match layout {
        vk::ImageLayout::UNDEFINED => (vk::AccessFlags::empty(), vk::PipelineStageFlags::TOP_OF_PIPE),
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => {
            (vk::AccessFlags::TRANSFER_WRITE, vk::PipelineStageFlags::TRANSFER)
        }
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => {
            (vk::AccessFlags::TRANSFER_READ, vk::PipelineStageFlags::TRANSFER)
        }
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => (
            vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        ),
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => (
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
        ),
        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL => (
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
                | vk::PipelineStageFlags::FRAGMENT_SHADER
                | vk::PipelineStageFlags::COMPUTE_SHADER,
        ),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => (
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::VERTEX_SHADER
                | vk::PipelineStageFlags::FRAGMENT_SHADER
                | vk::PipelineStageFlags::COMPUTE_SHADER,
        ),
        vk::ImageLayout::GENERAL => (
            vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE,
            vk::PipelineStageFlags::FRAGMENT_SHADER | vk::PipelineStageFlags::COMPUTE_SHADER,
        ),
        _ => (
            vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
            vk::PipelineStageFlags::ALL_COMMANDS,
        ),
    }
}

/// Record image barriers for `transitions` of `image`
pub(crate) unsafe fn record_transitions(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    aspect: vk::ImageAspectFlags,
    transitions: &[LayoutTransition],
) {
    for transition in transitions {
        let (src_access, src_stage) = layout_access(transition.old_layout);
        let (dst_access, dst_stage) = layout_access(transition.new_layout);
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(transition.old_layout)
            .new_layout(transition.new_layout)
            .src_access_mask(src_access)
            .dst_access_mask(dst_access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: transition.range.base_mip,
                level_count: transition.range.mip_count,
                base_array_layer: transition.range.base_layer,
                layer_count: transition.range.layer_count,
            });
        device.cmd_pipeline_barrier(
            command_buffer,
            src_stage,
            dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier],
        );
    }
}

#[cfg(test)]
#[path = "vulkan_layout_tests.rs"]
mod tests;
