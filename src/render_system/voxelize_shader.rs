pub mod vs {
    vulkano_shaders::shader! {
        ty: "vertex",
        src: r"
            #version 450

            // world space, already lit and premultiplied on the host
            layout(location = 0) in vec3 position;
            layout(location = 1) in vec4 radiance;

            layout(location = 0) out vec4 out_radiance;

            layout(push_constant) uniform Slice {
                mat4 view_projection;
            } slice;

            void main() {
                gl_Position = slice.view_projection * vec4(position, 1.0);
                out_radiance = radiance;
            }
        ",
    }
}

pub mod fs {
    vulkano_shaders::shader! {
        ty: "fragment",
        src: r"
            #version 450

            layout(location = 0) in vec4 in_radiance;
            layout(location = 0) out vec4 f_color;

            void main() {
                f_color = clamp(in_radiance, 0.0, 1.0);
            }
        ",
    }
}
