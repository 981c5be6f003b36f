//! RISC-V 64 trampolines. `t1` carries the jump target and `t2` the export
//! record; both are temporaries the calling convention leaves to the callee.

#[doc(hidden)]
#[unsafe(naked)]
pub unsafe extern "C" fn bind_trampoline() {
    core::arch::naked_asm!(
        "
// ra, a0-a7, fa0-fa7; 8 bytes of padding keep sp 16-byte aligned
    addi sp,sp,-18*8
    sd ra,8*0(sp)
    sd a0,8*1(sp)
    sd a1,8*2(sp)
    sd a2,8*3(sp)
    sd a3,8*4(sp)
    sd a4,8*5(sp)
    sd a5,8*6(sp)
    sd a6,8*7(sp)
    sd a7,8*8(sp)
    fsd fa0,8*9(sp)
    fsd fa1,8*10(sp)
    fsd fa2,8*11(sp)
    fsd fa3,8*12(sp)
    fsd fa4,8*13(sp)
    fsd fa5,8*14(sp)
    fsd fa6,8*15(sp)
    fsd fa7,8*16(sp)
// bind_export(export)
    mv a0,t2
    call {0}
    mv t1,a0
    ld ra,8*0(sp)
    ld a0,8*1(sp)
    ld a1,8*2(sp)
    ld a2,8*3(sp)
    ld a3,8*4(sp)
    ld a4,8*5(sp)
    ld a5,8*6(sp)
    ld a6,8*7(sp)
    ld a7,8*8(sp)
    fld fa0,8*9(sp)
    fld fa1,8*10(sp)
    fld fa2,8*11(sp)
    fld fa3,8*12(sp)
    fld fa4,8*13(sp)
    fld fa5,8*14(sp)
    fld fa6,8*15(sp)
    fld fa7,8*16(sp)
    addi sp,sp,18*8
    jr t1
	",
        sym crate::module::bind_export,
    )
}

#[doc(hidden)]
#[macro_export]
macro_rules! __trampoline {
    ($export:path) => {
        ::core::arch::naked_asm!(
            "lla t2, {export}",
            "ld t1, 0(t2)",
            // load-acquire
            "fence r, rw",
            "beqz t1, 2f",
            "jr t1",
            "2:",
            "tail {bind}",
            export = sym $export,
            bind = sym $crate::arch::bind_trampoline,
        )
    };
}
