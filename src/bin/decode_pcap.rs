//! Decode framed streams carried over UDP in a pcap/pcapng capture.
//!
//! Usage:
//!   decode_pcap [--verbose] [--dump[=PATH]] CAPTURE.pcap
//!
//! Each UDP flow (source address/port to destination address/port) gets its
//! own decoder, so frames split across datagrams reassemble exactly as they
//! would on a live stream. A protocol error poisons that flow's decoder and
//! the rest of the flow is skipped, matching the decoder's no-resync policy.

use pcap_parser::pcapng::Block as PcapNgBlock;
use pcap_parser::traits::{PcapNGPacketBlock, PcapReaderIterator};
use pcap_parser::{Linktype, PcapBlockOwned, PcapError};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;

use zedframe::dump::format_frame;
use zedframe::{FrameDecoder, FrameError};

/// One UDP flow: (source ip, source port, destination ip, destination port).
type FlowKey = ([u8; 4], u16, [u8; 4], u16);

#[derive(Default)]
struct Stats {
    packets: u64,
    udp_payloads: u64,
    frames: u64,
    failed_flows: u64,
    first_errors: HashMap<FlowKey, String>,
}

fn ethernet_l3(frame: &[u8]) -> Option<&[u8]> {
    if frame.len() < 14 {
        return None;
    }
    let mut off = 12usize;
    let mut ethertype = u16::from_be_bytes([frame[off], frame[off + 1]]);
    off += 2;
    while ethertype == 0x8100 || ethertype == 0x88a8 {
        if frame.len() < off + 4 + 2 {
            return None;
        }
        off += 4; // TCI + inner ethertype starts after 4 bytes
        ethertype = u16::from_be_bytes([frame[off], frame[off + 1]]);
        off += 2;
    }
    match ethertype {
        0x0800 => Some(&frame[off..]), // IPv4
        _ => None,
    }
}

fn linux_sll_l3(frame: &[u8]) -> Option<&[u8]> {
    // Linux cooked capture v1 (SLL): 16-byte header, protocol at bytes 14..16
    if frame.len() < 16 {
        return None;
    }
    let proto = u16::from_be_bytes([frame[14], frame[15]]);
    match proto {
        0x0800 => Some(&frame[16..]), // IPv4
        _ => None,
    }
}

/// Extract the UDP flow key and payload from an IPv4 packet.
fn ipv4_udp_flow(l3: &[u8]) -> Option<(FlowKey, &[u8])> {
    if l3.len() < 20 {
        return None;
    }
    let ver_ihl = l3[0];
    if (ver_ihl >> 4) != 4 {
        return None;
    }
    let ihl = (ver_ihl & 0x0f) as usize * 4;
    if ihl < 20 || l3.len() < ihl {
        return None;
    }
    let total_len = u16::from_be_bytes([l3[2], l3[3]]) as usize;
    if total_len < ihl {
        return None;
    }
    let l3_trunc = if total_len <= l3.len() { &l3[..total_len] } else { l3 };
    if l3_trunc.len() < ihl + 8 || l3_trunc[9] != 17 {
        return None; // not UDP
    }
    let src: [u8; 4] = l3_trunc[12..16].try_into().ok()?;
    let dst: [u8; 4] = l3_trunc[16..20].try_into().ok()?;
    let udp = &l3_trunc[ihl..];
    if udp.len() < 8 {
        return None;
    }
    let sport = u16::from_be_bytes([udp[0], udp[1]]);
    let dport = u16::from_be_bytes([udp[2], udp[3]]);
    let udp_len = u16::from_be_bytes([udp[4], udp[5]]) as usize;
    if udp_len < 8 || udp.len() < udp_len {
        return None;
    }
    Some(((src, sport, dst, dport), &udp[8..udp_len]))
}

fn udp_flow_from_linktype(lt: Linktype, frame: &[u8]) -> Option<(FlowKey, &[u8])> {
    let l3 = match lt {
        Linktype(1) => ethernet_l3(frame),
        Linktype(113) => linux_sll_l3(frame),
        Linktype(101) => Some(frame), // raw IP
        _ => None,
    }?;
    ipv4_udp_flow(l3)
}

fn flow_label(flow: &FlowKey) -> String {
    let (src, sport, dst, dport) = flow;
    format!(
        "{}.{}.{}.{}:{} -> {}.{}.{}.{}:{}",
        src[0], src[1], src[2], src[3], sport, dst[0], dst[1], dst[2], dst[3], dport
    )
}

fn main() -> anyhow::Result<()> {
    let mut raw_args: Vec<String> = std::env::args().skip(1).collect();
    let verbose = if let Some(pos) = raw_args.iter().position(|a| a == "--verbose" || a == "-v") {
        raw_args.remove(pos);
        true
    } else {
        false
    };
    let dump_path: Option<PathBuf> = raw_args
        .iter()
        .position(|a| a.starts_with("--dump"))
        .and_then(|pos| {
            let arg = raw_args.remove(pos);
            if arg == "--dump" {
                Some(PathBuf::from("-"))
            } else {
                arg.strip_prefix("--dump=").map(PathBuf::from)
            }
        });
    let pcap_path: PathBuf = raw_args
        .into_iter()
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("usage: decode_pcap [--verbose] [--dump[=PATH]] CAPTURE"))?;

    let mut dump_writer: Option<Box<dyn Write>> = match dump_path.as_ref() {
        Some(p) if p.as_os_str() == "-" => Some(Box::new(std::io::stdout())),
        Some(p) => Some(Box::new(File::create(p)?)),
        None => None,
    };

    let mut decoders: HashMap<FlowKey, FrameDecoder> = HashMap::new();
    let mut failed: HashMap<FlowKey, FrameError> = HashMap::new();
    let mut stats = Stats::default();

    // Probe file type (pcap vs pcapng) using the magic at start of file.
    let mut probe = [0u8; 4];
    {
        let mut f = File::open(&pcap_path)?;
        f.read_exact(&mut probe)?;
    }
    let is_pcapng = probe == [0x0a, 0x0d, 0x0d, 0x0a];
    let file = File::open(&pcap_path)?;
    if is_pcapng {
        run_pcapng(file, verbose, &mut dump_writer, &mut decoders, &mut failed, &mut stats)?;
    } else {
        run_legacy_pcap(file, verbose, &mut dump_writer, &mut decoders, &mut failed, &mut stats)?;
    }

    eprintln!("pcap: {}", pcap_path.display());
    eprintln!("packets: {}", stats.packets);
    eprintln!("udp payloads: {}", stats.udp_payloads);
    eprintln!("flows: {}", decoders.len());
    eprintln!("frames decoded: {}", stats.frames);
    eprintln!("failed flows: {}", stats.failed_flows);
    if !stats.first_errors.is_empty() {
        let mut flows: Vec<_> = stats.first_errors.into_iter().collect();
        flows.sort_by_key(|(k, _)| *k);
        eprintln!("first error per failed flow:");
        for (flow, err) in flows {
            eprintln!("  {}: {}", flow_label(&flow), err);
        }
    }

    Ok(())
}

fn run_legacy_pcap<R: Read>(
    file: R,
    verbose: bool,
    dump: &mut Option<Box<dyn Write>>,
    decoders: &mut HashMap<FlowKey, FrameDecoder>,
    failed: &mut HashMap<FlowKey, FrameError>,
    stats: &mut Stats,
) -> anyhow::Result<()> {
    let mut reader = pcap_parser::pcap::LegacyPcapReader::new(1 << 20, file)?;
    let mut linktype: Option<Linktype> = None;
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                match block {
                    PcapBlockOwned::LegacyHeader(h) => linktype = Some(h.network),
                    PcapBlockOwned::Legacy(b) => {
                        stats.packets += 1;
                        let lt = linktype.unwrap_or(Linktype(1));
                        if let Some((flow, payload)) = udp_flow_from_linktype(lt, b.data) {
                            process_udp_payload(flow, payload, verbose, dump, decoders, failed, stats)?;
                        }
                    }
                    PcapBlockOwned::NG(_) => {}
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete(_)) => {
                reader
                    .refill()
                    .map_err(|e| anyhow::anyhow!("pcap refill error: {:?}", e))?;
            }
            Err(e) => return Err(anyhow::anyhow!("pcap read error: {:?}", e)),
        }
    }
    Ok(())
}

fn run_pcapng<R: Read>(
    file: R,
    verbose: bool,
    dump: &mut Option<Box<dyn Write>>,
    decoders: &mut HashMap<FlowKey, FrameDecoder>,
    failed: &mut HashMap<FlowKey, FrameError>,
    stats: &mut Stats,
) -> anyhow::Result<()> {
    let mut reader = pcap_parser::pcapng::PcapNGReader::new(1 << 20, file)?;
    let mut if_linktypes: Vec<Linktype> = Vec::new();
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                if let PcapBlockOwned::NG(b) = block {
                    match &b {
                        PcapNgBlock::InterfaceDescription(idb) => if_linktypes.push(idb.linktype),
                        PcapNgBlock::EnhancedPacket(epb) => {
                            stats.packets += 1;
                            let lt = if_linktypes
                                .get(epb.if_id as usize)
                                .copied()
                                .unwrap_or(Linktype(1));
                            if let Some((flow, payload)) =
                                udp_flow_from_linktype(lt, epb.packet_data())
                            {
                                process_udp_payload(
                                    flow, payload, verbose, dump, decoders, failed, stats,
                                )?;
                            }
                        }
                        PcapNgBlock::SimplePacket(spb) => {
                            stats.packets += 1;
                            let lt = if_linktypes.first().copied().unwrap_or(Linktype(1));
                            if let Some((flow, payload)) =
                                udp_flow_from_linktype(lt, spb.packet_data())
                            {
                                process_udp_payload(
                                    flow, payload, verbose, dump, decoders, failed, stats,
                                )?;
                            }
                        }
                        _ => {}
                    }
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete(_)) => {
                reader
                    .refill()
                    .map_err(|e| anyhow::anyhow!("pcapng refill error: {:?}", e))?;
            }
            Err(e) => return Err(anyhow::anyhow!("pcapng read error: {:?}", e)),
        }
    }
    Ok(())
}

fn process_udp_payload(
    flow: FlowKey,
    payload: &[u8],
    verbose: bool,
    dump: &mut Option<Box<dyn Write>>,
    decoders: &mut HashMap<FlowKey, FrameDecoder>,
    failed: &mut HashMap<FlowKey, FrameError>,
    stats: &mut Stats,
) -> anyhow::Result<()> {
    stats.udp_payloads += 1;
    if failed.contains_key(&flow) {
        return Ok(()); // flow is dead; skip the rest of it
    }
    let decoder = decoders.entry(flow).or_insert_with(FrameDecoder::new);
    for item in decoder.feed(payload) {
        match item {
            Ok(frame) => {
                stats.frames += 1;
                if verbose {
                    eprintln!("frame {} on {}", stats.frames, flow_label(&flow));
                }
                if let Some(w) = dump.as_mut() {
                    writeln!(w, "frame {} ({})", stats.frames, flow_label(&flow))?;
                    write!(w, "{}", format_frame(&frame))?;
                }
            }
            Err(e) => {
                stats.failed_flows += 1;
                stats.first_errors.insert(flow, e.to_string());
                failed.insert(flow, e);
                break;
            }
        }
    }
    Ok(())
}
