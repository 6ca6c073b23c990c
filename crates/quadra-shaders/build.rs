//! Build script to compile the quad GLSL shaders to SPIR-V.
//!
//! Each stage is written to the workspace `shaders/output/` directory the
//! renderer loads from at runtime.

use shaderc::{Compiler, ShaderKind};
use std::fs;
use std::path::Path;

fn main() {
    let workspace_shaders = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../shaders");
    let runtime_dir = workspace_shaders.join("output");

    println!("cargo:rerun-if-changed=../../shaders/quad.vert");
    println!("cargo:rerun-if-changed=../../shaders/quad.frag");
    println!("cargo:rerun-if-changed=../../shaders/output");

    fs::create_dir_all(&runtime_dir)
        .unwrap_or_else(|e| panic!("Failed to create {:?}: {}", runtime_dir, e));

    let compiler = Compiler::new().expect("Failed to create shader compiler");

    for (source, output, kind) in [
        ("quad.vert", "vert.spv", ShaderKind::Vertex),
        ("quad.frag", "frag.spv", ShaderKind::Fragment),
    ] {
        let spirv = compile_shader(&compiler, workspace_shaders.join(source), kind);
        write_spirv(&spirv, runtime_dir.join(output));
    }
}

fn compile_shader(compiler: &Compiler, input: impl AsRef<Path>, kind: ShaderKind) -> Vec<u32> {
    let input_path = input.as_ref();

    let source = fs::read_to_string(input_path)
        .unwrap_or_else(|e| panic!("Failed to read shader {:?}: {}", input_path, e));

    let file_name = input_path.file_name().unwrap().to_str().unwrap();

    let mut options = shaderc::CompileOptions::new().expect("Failed to create compile options");
    options.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );
    options.set_optimization_level(shaderc::OptimizationLevel::Performance);

    let result = compiler
        .compile_into_spirv(&source, kind, file_name, "main", Some(&options))
        .unwrap_or_else(|e| panic!("Failed to compile shader {:?}: {}", input_path, e));

    if result.get_num_warnings() > 0 {
        println!(
            "cargo:warning=Shader warnings in {:?}: {}",
            input_path,
            result.get_warning_messages()
        );
    }

    result.as_binary().to_vec()
}

fn write_spirv(spirv: &[u32], output: impl AsRef<Path>) {
    let output_path = output.as_ref();
    fs::write(output_path, bytemuck::cast_slice::<u32, u8>(spirv))
        .unwrap_or_else(|e| panic!("Failed to write shader {:?}: {}", output_path, e));
}
