//! IR printer - human-readable textual representation of the IR
//!
//! Produces output like:
//! ```text
//! @x = global i32 zeroinitializer
//!
//! define i32 @main() {
//! bb0:
//!   %0 = add i32 1, 2
//!   store i32 %0, i32* @x
//!   ret i32 0
//! }
//! ```
//!
//! The exact grammar is diagnostic-only and not a stable interface.

use crate::instruction::Opcode;
use crate::module::Module;
use crate::value::{ValueId, ValueKind};
use std::collections::HashMap;
use std::fmt::Write;

/// Print an entire IR module to a string
pub fn print_module(module: &Module) -> String {
    let mut out = String::new();

    for &global in module.globals() {
        let name = module.value(global).name.as_deref().unwrap_or("?");
        let pointee = module
            .types()
            .pointee(module.ty_of(global))
            .expect("global values have pointer type");
        let init = module.global_initializer(global);
        let _ = writeln!(
            out,
            "@{} = global {} {}",
            name,
            module.types().display(pointee),
            constant_text(module, init)
        );
    }
    if !module.globals().is_empty() {
        out.push('\n');
    }

    for (i, &func) in module.functions().iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&print_function(module, func));
    }

    out
}

/// Print a single function (or external declaration) to a string
pub fn print_function(module: &Module, func: ValueId) -> String {
    let mut out = String::new();
    let name = module.value(func).name.as_deref().unwrap_or("?");
    let fn_ty = module.ty_of(func);
    let ret = module
        .types()
        .return_type(fn_ty)
        .expect("function values have function type");

    if module.is_declaration(func) {
        let params: Vec<String> = module
            .types()
            .param_types(fn_ty)
            .unwrap_or(&[])
            .iter()
            .map(|&p| module.types().display(p).to_string())
            .collect();
        let _ = writeln!(
            out,
            "declare {} @{}({})",
            module.types().display(ret),
            name,
            params.join(", ")
        );
        return out;
    }

    let names = assign_names(module, func);

    let params: Vec<String> = module
        .function_params(func)
        .iter()
        .map(|&arg| {
            format!(
                "{} {}",
                module.types().display(module.ty_of(arg)),
                names[&arg]
            )
        })
        .collect();
    let _ = writeln!(
        out,
        "define {} @{}({}) {{",
        module.types().display(ret),
        name,
        params.join(", ")
    );

    for &block in module.function_blocks(func) {
        let _ = writeln!(out, "{}:", names[&block]);
        for &inst in module.block_instructions(block) {
            let _ = writeln!(out, "  {}", instruction_text(module, inst, &names));
        }
    }
    out.push_str("}\n");
    out
}

/// Number arguments, blocks and value-producing instructions per function
fn assign_names(module: &Module, func: ValueId) -> HashMap<ValueId, String> {
    let mut names = HashMap::new();
    for &arg in module.function_params(func) {
        let label = module
            .value(arg)
            .name
            .clone()
            .unwrap_or_else(|| "arg".to_string());
        names.insert(arg, format!("%{label}"));
    }
    let mut counter = 0usize;
    for (i, &block) in module.function_blocks(func).iter().enumerate() {
        names.insert(block, format!("bb{i}"));
        for &inst in module.block_instructions(block) {
            if !module.types().is_void(module.ty_of(inst)) {
                names.insert(inst, format!("%{counter}"));
                counter += 1;
            }
        }
    }
    names
}

fn constant_text(module: &Module, value: ValueId) -> String {
    match &module.value(value).kind {
        ValueKind::ConstInt(v) => format!("{v}"),
        ValueKind::ConstFloat(v) => format!("{v:?}"),
        ValueKind::ConstZero => "zeroinitializer".to_string(),
        _ => "?".to_string(),
    }
}

/// Bare name of an operand, without its type
fn operand_name(module: &Module, value: ValueId, names: &HashMap<ValueId, String>) -> String {
    match &module.value(value).kind {
        ValueKind::ConstInt(_) | ValueKind::ConstFloat(_) | ValueKind::ConstZero => {
            constant_text(module, value)
        }
        ValueKind::Global { .. } | ValueKind::Function(_) => {
            format!("@{}", module.value(value).name.as_deref().unwrap_or("?"))
        }
        _ => names.get(&value).cloned().unwrap_or_else(|| "%?".to_string()),
    }
}

/// Operand with its type, e.g. `i32 %0`
fn typed_operand(module: &Module, value: ValueId, names: &HashMap<ValueId, String>) -> String {
    format!(
        "{} {}",
        module.types().display(module.ty_of(value)),
        operand_name(module, value, names)
    )
}

fn instruction_text(
    module: &Module,
    inst: ValueId,
    names: &HashMap<ValueId, String>,
) -> String {
    let opcode = module.opcode_of(inst);
    let operands = module.operands_of(inst);
    let ty = module.ty_of(inst);
    let result = if module.types().is_void(ty) {
        String::new()
    } else {
        format!("{} = ", names[&inst])
    };

    match opcode {
        Opcode::Alloca => {
            let allocated = module.types().pointee(ty).expect("alloca result is a pointer");
            format!("{result}alloca {}", module.types().display(allocated))
        }
        Opcode::Load => format!(
            "{result}load {}",
            typed_operand(module, operands[0], names)
        ),
        Opcode::Store => format!(
            "store {}, {}",
            typed_operand(module, operands[0], names),
            typed_operand(module, operands[1], names)
        ),
        Opcode::Ret => match operands.first() {
            Some(&v) => format!("ret {}", typed_operand(module, v, names)),
            None => "ret void".to_string(),
        },
        Opcode::Br => {
            if operands.len() == 1 {
                format!("br label {}", operand_name(module, operands[0], names))
            } else {
                format!(
                    "br {}, label {}, label {}",
                    typed_operand(module, operands[0], names),
                    operand_name(module, operands[1], names),
                    operand_name(module, operands[2], names)
                )
            }
        }
        Opcode::Call => {
            let callee = operand_name(module, operands[0], names);
            let args: Vec<String> = operands[1..]
                .iter()
                .map(|&a| typed_operand(module, a, names))
                .collect();
            format!(
                "{result}call {} {}({})",
                module.types().display(ty),
                callee,
                args.join(", ")
            )
        }
        Opcode::Phi => {
            let pairs: Vec<String> = operands
                .chunks(2)
                .map(|pair| {
                    format!(
                        "[ {}, {} ]",
                        operand_name(module, pair[0], names),
                        operand_name(module, pair[1], names)
                    )
                })
                .collect();
            format!(
                "{result}phi {} {}",
                module.types().display(ty),
                pairs.join(", ")
            )
        }
        Opcode::GetElementPtr => {
            let parts: Vec<String> = operands
                .iter()
                .map(|&op| typed_operand(module, op, names))
                .collect();
            format!("{result}getelementptr {}", parts.join(", "))
        }
        Opcode::ZExt | Opcode::FpToSi | Opcode::SiToFp => format!(
            "{result}{} {} to {}",
            opcode.mnemonic(),
            typed_operand(module, operands[0], names),
            module.types().display(ty)
        ),
        // arithmetic and comparisons share one shape
        _ => format!(
            "{result}{} {} {}, {}",
            opcode.mnemonic(),
            module.types().display(module.ty_of(operands[0])),
            operand_name(module, operands[0], names),
            operand_name(module, operands[1], names)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::IrBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_print_simple_function() {
        let mut module = Module::new("test");
        let i32_ty = module.types().int32_ty();
        let func = module.add_function("sum", i32_ty, &[i32_ty, i32_ty], false);
        let mut builder = IrBuilder::new(module);
        let entry = builder.append_block(func);
        builder.set_insert_point(entry);

        let args = builder.module.function_params(func).to_vec();
        let add = builder.build_binary(Opcode::Add, args[0], args[1]);
        builder.build_ret(Some(add));

        let module = builder.into_module();
        let text = print_function(&module, func);
        assert_eq!(
            text,
            "define i32 @sum(i32 %arg0, i32 %arg1) {\n\
             bb0:\n\
             \x20 %0 = add i32 %arg0, %arg1\n\
             \x20 ret i32 %0\n\
             }\n"
        );
    }

    #[test]
    fn test_print_module_with_global_and_declaration() {
        let mut module = Module::new("test");
        let i32_ty = module.types().int32_ty();
        let void = module.types().void_ty();
        let zero = module.const_zero(i32_ty);
        module.add_global("x", i32_ty, zero);
        module.add_function("output", void, &[i32_ty], true);

        let text = print_module(&module);
        assert_eq!(
            text,
            "@x = global i32 zeroinitializer\n\ndeclare void @output(i32)\n"
        );
    }

    #[test]
    fn test_print_branch_and_store() {
        let mut module = Module::new("test");
        let i32_ty = module.types().int32_ty();
        let func = module.add_function("f", i32_ty, &[], false);
        let mut builder = IrBuilder::new(module);
        let entry = builder.append_block(func);
        let exit = builder.append_block(func);
        builder.set_insert_point(entry);

        let slot = builder.build_alloca(i32_ty);
        let seven = builder.module.const_int(7);
        builder.build_store(seven, slot);
        builder.build_br(exit);
        builder.set_insert_point(exit);
        let v = builder.build_load(slot);
        builder.build_ret(Some(v));

        let module = builder.into_module();
        let text = print_function(&module, func);
        assert_eq!(
            text,
            "define i32 @f() {\n\
             bb0:\n\
             \x20 %0 = alloca i32\n\
             \x20 store i32 7, i32* %0\n\
             \x20 br label bb1\n\
             bb1:\n\
             \x20 %1 = load i32* %0\n\
             \x20 ret i32 %1\n\
             }\n"
        );
    }
}
