//! AArch64 trampolines.
//!
//! A trampoline jumps through `x16`, the intra-procedure-call register, which
//! a `bti c` landing pad accepts from `br`. The export record travels to the
//! binder in `x9`; neither register carries arguments. The slot is read with
//! `ldar`, pairing with the release store that binds it.

/// Binds the export whose record address is in `x9`, then jumps to it.
///
/// Saves the frame record, `x0`-`x7`, `x8` (indirect result location) and
/// `q0`-`q7`. The trampoline reached us with `b`, so `x30` still holds the
/// original caller's return address and is restored before the final jump.
///
/// # Safety
/// Must only be entered by a branch from a trampoline.
#[doc(hidden)]
#[unsafe(naked)]
pub unsafe extern "C" fn bind_trampoline() {
    core::arch::naked_asm!(
        "
    stp x29, x30, [sp, #-16]!
    mov x29, sp

    // 5 * 16 bytes of integer registers, 4 * 32 bytes of vector registers
    sub sp, sp, #208
    stp x0, x1, [sp, #0]
    stp x2, x3, [sp, #16]
    stp x4, x5, [sp, #32]
    stp x6, x7, [sp, #48]
    stp x8, x9, [sp, #64]
    stp q0, q1, [sp, #80]
    stp q2, q3, [sp, #112]
    stp q4, q5, [sp, #144]
    stp q6, q7, [sp, #176]

    // bind_export(export)
    mov x0, x9
    bl {0}
    mov x16, x0

    ldp q0, q1, [sp, #80]
    ldp q2, q3, [sp, #112]
    ldp q4, q5, [sp, #144]
    ldp q6, q7, [sp, #176]
    ldp x0, x1, [sp, #0]
    ldp x2, x3, [sp, #16]
    ldp x4, x5, [sp, #32]
    ldp x6, x7, [sp, #48]
    ldr x8, [sp, #64]
    add sp, sp, #208

    ldp x29, x30, [sp], #16
    br x16
    ",
        sym crate::module::bind_export,
    )
}

/// Body of an AArch64 trampoline forwarding through the slot of `$export`.
#[cfg(not(target_vendor = "apple"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __trampoline {
    ($export:path) => {
        ::core::arch::naked_asm!(
            // bti c
            "hint #34",
            "adrp x9, {export}",
            "add x9, x9, :lo12:{export}",
            "ldar x16, [x9]",
            "cbz x16, 2f",
            "br x16",
            "2:",
            "b {bind}",
            export = sym $export,
            bind = sym $crate::arch::bind_trampoline,
        )
    };
}

/// Body of an AArch64 trampoline forwarding through the slot of `$export`.
#[cfg(target_vendor = "apple")]
#[doc(hidden)]
#[macro_export]
macro_rules! __trampoline {
    ($export:path) => {
        ::core::arch::naked_asm!(
            "hint #34",
            "adrp x9, {export}@PAGE",
            "add x9, x9, {export}@PAGEOFF",
            "ldar x16, [x9]",
            "cbz x16, 2f",
            "br x16",
            "2:",
            "b {bind}",
            export = sym $export,
            bind = sym $crate::arch::bind_trampoline,
        )
    };
}
