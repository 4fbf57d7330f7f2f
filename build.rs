// Frame size is SVGA unless UXGA or VGA is selected
fn main() {
    if !cfg!(feature = "uxga") && !cfg!(feature = "vga") {
        println!("cargo:rustc-cfg=feature=\"svga\"");
    }
}
