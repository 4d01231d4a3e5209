#![cfg_attr(target_arch = "bpf", no_std)]
#![cfg_attr(target_arch = "bpf", no_main)]

#[cfg(not(target_arch = "bpf"))]
fn main() {}

#[cfg(target_arch = "bpf")]
use aya_ebpf::{bindings::xdp_action, macros::xdp, programs::XdpContext};

#[cfg(target_arch = "bpf")]
const ETH_HDR_LEN: usize = 14;
#[cfg(target_arch = "bpf")]
const ETH_P_IP: u16 = 0x0800;
#[cfg(target_arch = "bpf")]
const ETH_P_IPV6: u16 = 0x86dd;
#[cfg(target_arch = "bpf")]
const IPPROTO_UDP: u8 = 17;

/// Drops every UDP frame, IPv4 or IPv6. Anything unparseable is passed.
#[cfg(target_arch = "bpf")]
#[xdp]
#[allow(non_snake_case)]
pub fn dropXDP(ctx: XdpContext) -> u32 {
    match try_drop_udp(&ctx) {
        Ok(ret) => ret,
        Err(_) => xdp_action::XDP_PASS,
    }
}

#[cfg(target_arch = "bpf")]
#[inline(always)]
fn ptr_at<T>(ctx: &XdpContext, offset: usize) -> Result<*const T, ()> {
    let start = ctx.data();
    let end = ctx.data_end();
    if start + offset + core::mem::size_of::<T>() > end {
        return Err(());
    }
    Ok((start + offset) as *const T)
}

#[cfg(target_arch = "bpf")]
fn try_drop_udp(ctx: &XdpContext) -> Result<u32, ()> {
    let ether_type = u16::from_be(unsafe { *ptr_at::<u16>(ctx, 12)? });

    // Offset of the protocol / next-header byte within each L3 header.
    let proto = match ether_type {
        ETH_P_IP => unsafe { *ptr_at::<u8>(ctx, ETH_HDR_LEN + 9)? },
        ETH_P_IPV6 => unsafe { *ptr_at::<u8>(ctx, ETH_HDR_LEN + 6)? },
        _ => return Ok(xdp_action::XDP_PASS),
    };

    if proto == IPPROTO_UDP {
        Ok(xdp_action::XDP_DROP)
    } else {
        Ok(xdp_action::XDP_PASS)
    }
}

#[cfg(target_arch = "bpf")]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {
        core::hint::spin_loop();
    }
}
