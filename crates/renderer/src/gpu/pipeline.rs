use crate::backend::AttributeLocations;

pub(crate) fn uniform_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("canvas uniform layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

/// Builds the quad pipeline. Buffer slot 0 carries positions and slot 1
/// texcoords, each a tightly packed `vec2`.
pub(crate) fn quad_pipeline(
    device: &wgpu::Device,
    uniform_layout: &wgpu::BindGroupLayout,
    vertex_module: &wgpu::ShaderModule,
    fragment_module: &wgpu::ShaderModule,
    surface_format: wgpu::TextureFormat,
    attributes: &AttributeLocations,
) -> wgpu::RenderPipeline {
    let position_attributes = vertex_attribute(attributes.position);
    let texcoord_attributes = vertex_attribute(attributes.texcoord);
    let buffers = [
        wgpu::VertexBufferLayout {
            array_stride: VEC2_STRIDE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &position_attributes,
        },
        wgpu::VertexBufferLayout {
            array_stride: VEC2_STRIDE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &texcoord_attributes,
        },
    ];

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("canvas pipeline layout"),
        bind_group_layouts: &[uniform_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("canvas pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: vertex_module,
            entry_point: Some("main"),
            buffers: &buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: fragment_module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}

const VEC2_STRIDE: wgpu::BufferAddress = (2 * std::mem::size_of::<f32>()) as wgpu::BufferAddress;

fn vertex_attribute(location: Option<u32>) -> Vec<wgpu::VertexAttribute> {
    location
        .map(|shader_location| wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 0,
            shader_location,
        })
        .into_iter()
        .collect()
}
