//! x86-64 trampolines, for both the System V and the Win64 calling convention.
//!
//! `r11` is the only register a trampoline writes before reaching the genuine
//! function. Neither convention passes arguments in it.

/// Binds the export whose record address is in `r11`, then jumps to it.
///
/// Saves every register that may carry an argument: the six System V integer
/// registers (a superset of the four Win64 ones), `r10` (static chain), `rax`
/// (`al` holds the vector register count of a variadic call) and
/// `xmm0`-`xmm7`.
///
/// # Safety
/// Must only be entered by a jump from a trampoline, with the caller's return
/// address on top of the stack.
#[cfg(not(windows))]
#[doc(hidden)]
#[unsafe(naked)]
pub unsafe extern "C" fn bind_trampoline() {
    core::arch::naked_asm!(
        "
    push rdi
    push rsi
    push rdx
    push rcx
    push r8
    push r9
    push r10
    push rax

    // xmm0-xmm7 plus 8 bytes so the call below sees a 16-byte aligned stack
    sub rsp, 136
    movdqu [rsp + 0], xmm0
    movdqu [rsp + 16], xmm1
    movdqu [rsp + 32], xmm2
    movdqu [rsp + 48], xmm3
    movdqu [rsp + 64], xmm4
    movdqu [rsp + 80], xmm5
    movdqu [rsp + 96], xmm6
    movdqu [rsp + 112], xmm7

    // bind_export(export)
    mov rdi, r11
    call {0}
    mov r11, rax

    movdqu xmm0, [rsp + 0]
    movdqu xmm1, [rsp + 16]
    movdqu xmm2, [rsp + 32]
    movdqu xmm3, [rsp + 48]
    movdqu xmm4, [rsp + 64]
    movdqu xmm5, [rsp + 80]
    movdqu xmm6, [rsp + 96]
    movdqu xmm7, [rsp + 112]
    add rsp, 136

    pop rax
    pop r10
    pop r9
    pop r8
    pop rcx
    pop rdx
    pop rsi
    pop rdi

    jmp r11
    ",
        sym crate::module::bind_export,
    )
}

/// Binds the export whose record address is in `r11`, then jumps to it.
///
/// Same register set as the System V binder, plus the 32 bytes of shadow
/// space the Win64 convention reserves for the callee.
///
/// # Safety
/// Must only be entered by a jump from a trampoline, with the caller's return
/// address on top of the stack.
#[cfg(windows)]
#[doc(hidden)]
#[unsafe(naked)]
pub unsafe extern "C" fn bind_trampoline() {
    core::arch::naked_asm!(
        "
    push rdi
    push rsi
    push rdx
    push rcx
    push r8
    push r9
    push r10
    push rax

    // shadow space, xmm0-xmm7 and 8 bytes of alignment
    sub rsp, 168
    movdqu [rsp + 32], xmm0
    movdqu [rsp + 48], xmm1
    movdqu [rsp + 64], xmm2
    movdqu [rsp + 80], xmm3
    movdqu [rsp + 96], xmm4
    movdqu [rsp + 112], xmm5
    movdqu [rsp + 128], xmm6
    movdqu [rsp + 144], xmm7

    mov rcx, r11
    call {0}
    mov r11, rax

    movdqu xmm0, [rsp + 32]
    movdqu xmm1, [rsp + 48]
    movdqu xmm2, [rsp + 64]
    movdqu xmm3, [rsp + 80]
    movdqu xmm4, [rsp + 96]
    movdqu xmm5, [rsp + 112]
    movdqu xmm6, [rsp + 128]
    movdqu xmm7, [rsp + 144]
    add rsp, 168

    pop rax
    pop r10
    pop r9
    pop r8
    pop rcx
    pop rdx
    pop rsi
    pop rdi

    jmp r11
    ",
        sym crate::module::bind_export,
    )
}

/// Body of an x86-64 trampoline forwarding through the slot of `$export`.
#[doc(hidden)]
#[macro_export]
macro_rules! __trampoline {
    ($export:path) => {
        ::core::arch::naked_asm!(
            "endbr64",
            // The slot is the first field of the export record.
            "mov r11, qword ptr [rip + {export}]",
            "test r11, r11",
            "jz 2f",
            "jmp r11",
            "2:",
            "lea r11, [rip + {export}]",
            "jmp {bind}",
            export = sym $export,
            bind = sym $crate::arch::bind_trampoline,
        )
    };
}
